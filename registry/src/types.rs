use serde::Serialize;

use market::encoder::EncoderSnapshot;
use market::feed::FeedStatus;
use scoring::{MeritScore, ValuationFeatures};

/// One row of the materialized view: a snapshot plus its merit scores and
/// the valuation features that produced the fundamental side.
#[derive(Clone, Debug, Serialize)]
pub struct ScoredRow {
    #[serde(flatten)]
    pub snapshot: EncoderSnapshot,
    pub merit: MeritScore,
    pub features: Option<ValuationFeatures>,
}

/// Liveness and progress probe for operators and external consumers.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RegistryHealth {
    pub bootstrap_complete: bool,
    pub bootstrap_progress_pct: u8,
    pub stream_count: usize,
    pub tradable_count: usize,
    pub feed: FeedStatus,
}
