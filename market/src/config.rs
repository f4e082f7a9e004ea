use std::collections::HashSet;
use std::time::Duration;

use crate::types::Threshold;

/// Every sensitivity an encoder is maintained for, in parts-per-million.
const ALL_THRESHOLDS_PPM: [u32; 14] = [
    625, 1_250, 2_500, 5_000, 7_500, 10_000, 12_500, 15_000, 20_000, 25_000, 30_000, 40_000,
    50_000, 100_000,
];

/// Sensitivities that make it into the materialized view.
const REPORTABLE_THRESHOLDS_PPM: [u32; 10] = [
    5_000, 7_500, 10_000, 12_500, 15_000, 20_000, 25_000, 30_000, 40_000, 50_000,
];

const ETF_SYMBOLS: [&str; 19] = [
    "SPY", "QQQ", "IWM", "DIA", "XLF", "XLE", "XLU", "XLK", "XLP", "XLB", "XLV", "XLI", "XLY",
    "XLC", "XLRE", "KRE", "SMH", "XBI", "GDX",
];

const EQUITY_SYMBOLS: [&str; 14] = [
    "AAPL", "MSFT", "GOOGL", "GOOG", "AMZN", "NVDA", "META", "TSLA", "AVGO", "ORCL", "ADBE",
    "CRM", "AMD", "INTC",
];

/// Immutable runtime configuration.
///
/// Built once at startup and passed as `Arc<StasisConfig>` into every
/// component; nothing mutates it after bootstrap.
#[derive(Clone, Debug)]
pub struct StasisConfig {
    /// Instrument universe, deduplicated, order preserved.
    pub symbols: Vec<String>,

    /// Subset of the universe tagged as index/sector ETFs.
    pub etf_symbols: HashSet<String>,

    /// Every sensitivity an encoder is maintained for.
    pub thresholds: Vec<Threshold>,

    /// Sensitivities that make it into the materialized cache.
    pub reportable_thresholds: Vec<Threshold>,

    /// Minute-bar lookback replayed through each encoder at bootstrap.
    pub history_days: i64,

    /// Minimum run length before a row can be flagged tradable.
    pub min_tradable_run: usize,

    // =========================
    // Upstream endpoints
    // =========================
    /// Tick stream endpoint.
    pub ws_url: String,

    /// Historical aggregate endpoint.
    pub rest_url: String,

    /// Secret key sent in the stream authentication request and appended
    /// to REST calls.
    pub api_key: String,

    // =========================
    // Cadences & pacing
    // =========================
    /// Polling interval of the live-apply loop.
    pub live_apply_interval: Duration,

    /// Refresh interval of the cache-materialization loop.
    pub cache_refresh_interval: Duration,

    /// Delay between reconnect attempts on the tick stream.
    pub reconnect_delay: Duration,

    /// Instruments per subscription request.
    pub subscribe_batch: usize,

    /// Delay between subscription batches.
    pub subscribe_pace: Duration,

    /// Delay between historical REST calls during bootstrap.
    ///
    /// The upstream rate-limits aggressively; pacing here keeps bootstrap
    /// slow but reliable.
    pub rest_pace: Duration,
}

impl StasisConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("FEED_API_KEY").unwrap_or_default();
        let ws_url = std::env::var("FEED_WS_URL")
            .unwrap_or_else(|_| "wss://delayed.polygon.io/stocks".to_string());
        let rest_url = std::env::var("FEED_REST_URL")
            .unwrap_or_else(|_| "https://api.polygon.io".to_string());

        let symbols = dedup_preserving_order(
            ETF_SYMBOLS
                .iter()
                .chain(EQUITY_SYMBOLS.iter())
                .map(|s| s.to_string()),
        );

        Self {
            symbols,
            etf_symbols: ETF_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            thresholds: ALL_THRESHOLDS_PPM.iter().map(|&p| Threshold::from_ppm(p)).collect(),
            reportable_thresholds: REPORTABLE_THRESHOLDS_PPM
                .iter()
                .map(|&p| Threshold::from_ppm(p))
                .collect(),
            history_days: 5,
            min_tradable_run: 3,

            ws_url,
            rest_url,
            api_key,

            live_apply_interval: Duration::from_millis(100),
            cache_refresh_interval: Duration::from_millis(500),
            reconnect_delay: Duration::from_secs(5),
            subscribe_batch: 50,
            subscribe_pace: Duration::from_millis(100),
            rest_pace: Duration::from_millis(130),
        }
    }

    pub fn is_etf(&self, symbol: &str) -> bool {
        self.etf_symbols.contains(symbol)
    }
}

fn dedup_preserving_order(symbols: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols.filter(|s| seen.insert(s.clone())).collect()
}
