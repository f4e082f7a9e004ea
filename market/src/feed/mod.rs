pub mod history;
pub mod types;
pub mod ws;

pub use ws::{FeedStatus, PriceFeed};

use std::collections::HashMap;

use async_trait::async_trait;

/// Read side of the tick feed, as consumed by the registry.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest price per instrument, restricted to instruments with at
    /// least one observed update.
    async fn latest_prices(&self) -> HashMap<String, f64>;

    /// Connection-level health.
    async fn status(&self) -> FeedStatus;
}
