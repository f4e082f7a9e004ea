//! Stream registry.
//!
//! Owns every encoder and runs the three long-lived phases:
//!   1. bootstrap:  load reference data, replay historical minute bars
//!   2. live apply: poll the tick feed and fan prices into encoders
//!   3. cache:      snapshot + score everything into the materialized view
//!
//! Lock domains stay separate: the feed's price table, each encoder's own
//! mutex, and the snapshot cache. No call path holds more than one of them;
//! the encoders map is locked only to clone handles out, never across
//! encoder work.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use chrono::Utc;
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use market::config::StasisConfig;
use market::encoder::Encoder;
use market::feed::PriceSource;
use market::feed::history::{BarSource, average_volume_m, week52_from_daily};
use market::types::{Bar, StreamKey, SymbolReference};
use scoring::ValuationFeatures;

use crate::cache::SnapshotCache;
use crate::types::{RegistryHealth, ScoredRow};

/// Fallback average volume (millions) when the reference fetch fails.
const DEFAULT_AVG_VOLUME_M: f64 = 10.0;

/// Daily-bar lookbacks for the reference pass.
const WEEK52_LOOKBACK_DAYS: i64 = 365;
const VOLUME_LOOKBACK_DAYS: i64 = 45;
const VOLUME_AVERAGE_BARS: usize = 30;

type EncoderHandle = Arc<Mutex<Encoder>>;

pub struct StreamRegistry<B, P> {
    cfg: Arc<StasisConfig>,
    bars: B,
    feed: Arc<P>,
    valuations: HashMap<String, ValuationFeatures>,

    encoders: Mutex<HashMap<StreamKey, EncoderHandle>>,
    /// Immutable after bootstrap.
    reference: OnceCell<HashMap<String, SymbolReference>>,

    cache: SnapshotCache,

    bootstrap_complete: AtomicBool,
    bootstrap_progress: AtomicU8,
    stream_count: AtomicUsize,
    tradable_count: AtomicUsize,
}

impl<B, P> StreamRegistry<B, P>
where
    B: BarSource,
    P: PriceSource,
{
    pub fn new(
        cfg: Arc<StasisConfig>,
        bars: B,
        feed: Arc<P>,
        valuations: HashMap<String, ValuationFeatures>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            bars,
            feed,
            valuations,
            encoders: Mutex::new(HashMap::new()),
            reference: OnceCell::new(),
            cache: SnapshotCache::new(),
            bootstrap_complete: AtomicBool::new(false),
            bootstrap_progress: AtomicU8::new(0),
            stream_count: AtomicUsize::new(0),
            tradable_count: AtomicUsize::new(0),
        })
    }

    /// Load reference data, then create and seed every encoder.
    ///
    /// Individual fetch failures skip the affected instrument and move on;
    /// the run as a whole never aborts. Progress only ever increases, and
    /// the completion gate flips once every surviving pair exists.
    pub async fn bootstrap(&self) {
        let total = self.cfg.symbols.len();
        info!(symbols = total, "bootstrap starting");

        // Reference pass: 52-week range and average volume per instrument.
        let mut reference = HashMap::new();
        for symbol in &self.cfg.symbols {
            reference.insert(symbol.clone(), self.load_reference(symbol).await);
            tokio::time::sleep(self.cfg.rest_pace).await;
        }
        let with_week52 = reference.values().filter(|r| r.week52.is_some()).count();
        info!(symbols = total, with_week52, "reference data loaded");
        let _ = self.reference.set(reference);

        // History pass: replay minute bars through fresh encoders.
        let mut seeded = 0usize;
        for (i, symbol) in self.cfg.symbols.iter().enumerate() {
            match self.bars.minute_bars(symbol, self.cfg.history_days).await {
                Ok(bars) if bars.len() >= 2 => {
                    self.build_streams(symbol, &bars).await;
                    seeded += 1;
                }
                Ok(_) => warn!(symbol, "not enough history, skipping"),
                Err(e) => warn!(symbol, error = %e, "history fetch failed, skipping"),
            }
            let pct = ((i + 1) * 100 / total) as u8;
            self.bootstrap_progress.store(pct, Ordering::Relaxed);
            tokio::time::sleep(self.cfg.rest_pace).await;
        }

        let (streams, tradable) = self.count_streams().await;
        self.stream_count.store(streams, Ordering::Relaxed);
        self.tradable_count.store(tradable, Ordering::Relaxed);
        self.bootstrap_complete.store(true, Ordering::Release);

        info!(seeded, streams, tradable, "bootstrap complete");
    }

    async fn load_reference(&self, symbol: &str) -> SymbolReference {
        let mut entry = SymbolReference {
            week52: None,
            avg_volume_m: DEFAULT_AVG_VOLUME_M,
        };

        match self
            .bars
            .daily_bars(symbol, WEEK52_LOOKBACK_DAYS, WEEK52_LOOKBACK_DAYS as u32)
            .await
        {
            Ok(bars) => entry.week52 = week52_from_daily(&bars),
            Err(e) => warn!(symbol, error = %e, "52-week fetch failed"),
        }

        match self
            .bars
            .daily_bars(symbol, VOLUME_LOOKBACK_DAYS, VOLUME_LOOKBACK_DAYS as u32)
            .await
        {
            Ok(bars) => {
                if let Some(avg) = average_volume_m(&bars, VOLUME_AVERAGE_BARS) {
                    entry.avg_volume_m = avg;
                }
            }
            Err(e) => warn!(symbol, error = %e, "volume fetch failed"),
        }

        entry
    }

    /// One encoder per threshold, seeded at the first bar and replayed
    /// through the rest in chronological order.
    async fn build_streams(&self, symbol: &str, bars: &[Bar]) {
        let avg_volume_m = self
            .reference
            .get()
            .and_then(|r| r.get(symbol))
            .map(|r| r.avg_volume_m)
            .unwrap_or(DEFAULT_AVG_VOLUME_M);
        let is_etf = self.cfg.is_etf(symbol);

        let mut encoders = self.encoders.lock().await;
        for &threshold in &self.cfg.thresholds {
            let mut encoder = Encoder::new(
                symbol.to_string(),
                threshold,
                is_etf,
                avg_volume_m,
                bars[0].close,
                bars[0].ts,
            );
            for bar in bars {
                encoder.process(bar.close, bar.ts);
            }
            encoders.insert(
                StreamKey::new(symbol, threshold),
                Arc::new(Mutex::new(encoder)),
            );
        }
    }

    async fn count_streams(&self) -> (usize, usize) {
        let handles: Vec<EncoderHandle> = self.encoders.lock().await.values().cloned().collect();
        let mut tradable = 0;
        for handle in &handles {
            if handle.lock().await.is_tradable(self.cfg.min_tradable_run) {
                tradable += 1;
            }
        }
        (handles.len(), tradable)
    }

    /// Live-apply loop. Idles behind the bootstrap gate, then fans every
    /// updated feed price into all threshold-variant encoders for that
    /// instrument. Last value wins; there is no queueing.
    pub async fn run_live_loop(self: Arc<Self>) {
        let mut ticker = interval(self.cfg.live_apply_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.bootstrap_complete.load(Ordering::Acquire) {
                continue;
            }
            self.apply_latest().await;
        }
    }

    /// One live-apply pass over the latest price map.
    pub async fn apply_latest(&self) {
        let prices = self.feed.latest_prices().await;
        if prices.is_empty() {
            return;
        }
        let ts = Utc::now();

        let handles: Vec<(EncoderHandle, f64)> = {
            let encoders = self.encoders.lock().await;
            encoders
                .iter()
                .filter_map(|(key, handle)| {
                    prices
                        .get(&key.symbol)
                        .map(|price| (Arc::clone(handle), *price))
                })
                .collect()
        };

        for (handle, price) in handles {
            handle.lock().await.process(price, ts);
        }
    }

    /// Cache-materialization loop. Idles behind the bootstrap gate, then
    /// republishes the scored view at a fixed cadence.
    pub async fn run_cache_loop(self: Arc<Self>) {
        let mut ticker = interval(self.cfg.cache_refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.bootstrap_complete.load(Ordering::Acquire) {
                continue;
            }
            self.refresh_cache().await;
        }
    }

    /// One snapshot → score → publish pass over the reportable subset.
    /// Readers of the cache see either the previous list or this one,
    /// never a partial build.
    pub async fn refresh_cache(&self) {
        let prices = self.feed.latest_prices().await;
        let now = Utc::now();

        let handles: Vec<(StreamKey, EncoderHandle)> = {
            let encoders = self.encoders.lock().await;
            encoders
                .iter()
                .filter(|(key, _)| self.cfg.reportable_thresholds.contains(&key.threshold))
                .map(|(key, handle)| (key.clone(), Arc::clone(handle)))
                .collect()
        };

        let mut rows = Vec::with_capacity(handles.len());
        let mut tradable = 0usize;
        for (key, handle) in handles {
            let week52 = self
                .reference
                .get()
                .and_then(|r| r.get(&key.symbol))
                .and_then(|r| r.week52);

            let snapshot = handle.lock().await.snapshot(
                prices.get(&key.symbol).copied(),
                week52.as_ref(),
                self.cfg.min_tradable_run,
                now,
            );

            let features = self.valuations.get(&key.symbol);
            let merit = scoring::merit(&snapshot, features);
            if snapshot.is_tradable {
                tradable += 1;
            }
            rows.push(ScoredRow {
                snapshot,
                merit,
                features: features.cloned(),
            });
        }

        self.tradable_count.store(tradable, Ordering::Relaxed);
        self.cache.publish(rows).await;
    }

    /// Latest materialized view.
    pub async fn rows(&self) -> Arc<Vec<ScoredRow>> {
        self.cache.read().await
    }

    pub fn bootstrap_complete(&self) -> bool {
        self.bootstrap_complete.load(Ordering::Acquire)
    }

    pub async fn health(&self) -> RegistryHealth {
        RegistryHealth {
            bootstrap_complete: self.bootstrap_complete.load(Ordering::Acquire),
            bootstrap_progress_pct: self.bootstrap_progress.load(Ordering::Relaxed),
            stream_count: self.stream_count.load(Ordering::Relaxed),
            tradable_count: self.tradable_count.load(Ordering::Relaxed),
            feed: self.feed.status().await,
        }
    }
}
