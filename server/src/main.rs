use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::logger::init_tracing;
use market::config::StasisConfig;
use market::feed::history::{BarClient, BarSource};
use market::feed::{PriceFeed, PriceSource};
use registry::StreamRegistry;
use scoring::ValuationFeatures;

/// Valuation features come from an upstream derivation pipeline; here they
/// are read once from a JSON file keyed by symbol, when one is provided.
fn load_valuations() -> HashMap<String, ValuationFeatures> {
    let Ok(path) = std::env::var("VALUATION_FEATURES_PATH") else {
        tracing::info!("no valuation features configured, scoring falls back to 52-week positioning");
        return HashMap::new();
    };

    match std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| Ok(serde_json::from_str::<HashMap<String, ValuationFeatures>>(&raw)?))
    {
        Ok(map) => {
            tracing::info!(path, instruments = map.len(), "valuation features loaded");
            map
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "failed to load valuation features");
            HashMap::new()
        }
    }
}

/// Logs the registry health probe on a fixed cadence.
fn start_status_loop<B, P>(registry: Arc<StreamRegistry<B, P>>)
where
    B: BarSource + 'static,
    P: PriceSource + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let health = registry.health().await;
            tracing::info!(
                bootstrap_complete = health.bootstrap_complete,
                progress_pct = health.bootstrap_progress_pct,
                streams = health.stream_count,
                tradable = health.tradable_count,
                connected = health.feed.connected,
                tracked = health.feed.total,
                messages = health.feed.messages,
                "registry status"
            );
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing("stasis", is_production);

    tracing::info!("Starting stasis server...");

    let cfg = Arc::new(StasisConfig::from_env());
    let bars = BarClient::new(cfg.rest_url.clone(), cfg.api_key.clone())?;
    let feed = PriceFeed::new(Arc::clone(&cfg));
    let valuations = load_valuations();

    let registry = StreamRegistry::new(Arc::clone(&cfg), bars, Arc::clone(&feed), valuations);

    feed.start();

    // Both loops idle behind the bootstrap gate until it opens.
    tokio::spawn(Arc::clone(&registry).run_live_loop());
    tokio::spawn(Arc::clone(&registry).run_cache_loop());
    start_status_loop(Arc::clone(&registry));

    let bootstrapping = Arc::clone(&registry);
    tokio::spawn(async move { bootstrapping.bootstrap().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
