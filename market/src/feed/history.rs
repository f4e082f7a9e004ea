//! Historical bar access.
//!
//! Used twice: minute bars seed every encoder during bootstrap, daily bars
//! supply the 52-week range and average-volume reference data. Failures are
//! per instrument; callers skip and continue.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::types::{Bar, Week52};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned no usable data")]
    NoData,
}

/// Raw aggregate bar from the historical endpoint.
#[derive(Debug, Deserialize)]
struct RawBar {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct AggResponse {
    #[serde(default)]
    results: Vec<RawBar>,
}

/// Bar access seam consumed by the registry, mockable in tests.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Minute bars over the lookback window, oldest first.
    async fn minute_bars(&self, symbol: &str, days: i64) -> Result<Vec<Bar>, HistoryError>;

    /// Daily bars over `days`, oldest first, capped at `limit`.
    async fn daily_bars(&self, symbol: &str, days: i64, limit: u32)
    -> Result<Vec<Bar>, HistoryError>;
}

#[derive(Clone)]
pub struct BarClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl BarClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, HistoryError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    async fn aggregates(
        &self,
        symbol: &str,
        granularity: &str,
        days: i64,
        limit: u32,
    ) -> Result<Vec<Bar>, HistoryError> {
        let end = Utc::now();
        let start = end - chrono::Duration::days(days);

        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/{}/{}/{}?adjusted=true&sort=asc&limit={}&apiKey={}",
            self.base_url,
            symbol,
            granularity,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            limit,
            self.api_key,
        );

        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let body: AggResponse = resp.json().await?;

        let bars: Vec<Bar> = body
            .results
            .into_iter()
            .filter_map(|raw| {
                let ts = DateTime::from_timestamp_millis(raw.t)?;
                Some(Bar {
                    ts,
                    open: raw.o,
                    high: raw.h,
                    low: raw.l,
                    close: raw.c,
                    volume: raw.v,
                })
            })
            .collect();

        debug!(symbol, granularity, bars = bars.len(), "aggregates fetched");
        Ok(bars)
    }
}

#[async_trait]
impl BarSource for BarClient {
    async fn minute_bars(&self, symbol: &str, days: i64) -> Result<Vec<Bar>, HistoryError> {
        self.aggregates(symbol, "minute", days, 50_000).await
    }

    async fn daily_bars(
        &self,
        symbol: &str,
        days: i64,
        limit: u32,
    ) -> Result<Vec<Bar>, HistoryError> {
        self.aggregates(symbol, "day", days, limit).await
    }
}

/// 52-week summary over a daily series; `None` on an empty or flat series.
pub fn week52_from_daily(bars: &[Bar]) -> Option<Week52> {
    if bars.is_empty() {
        return None;
    }
    let high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let range = high - low;
    if range <= 0.0 {
        return None;
    }
    Some(Week52 { high, low, range })
}

/// Mean volume of the most recent `n` daily bars, in millions of shares.
pub fn average_volume_m(bars: &[Bar], n: usize) -> Option<f64> {
    let recent: Vec<f64> = bars.iter().rev().take(n).map(|b| b.volume).collect();
    if recent.is_empty() {
        return None;
    }
    Some(recent.iter().sum::<f64>() / recent.len() as f64 / 1_000_000.0)
}
