//! Merit scoring.
//!
//! Pure functions over an encoder snapshot and whatever valuation features
//! exist for the instrument. Nothing here performs I/O or holds state; the
//! registry calls [`merit`] once per row on every cache cycle.

pub mod fundamental;
pub mod technical;
pub mod types;

pub use fundamental::fundamental_score;
pub use technical::technical_score;
pub use types::{MeritScore, ValuationFeatures};

use market::encoder::EncoderSnapshot;

/// Score one snapshot. Missing valuation features fall back to 52-week
/// positioning only.
pub fn merit(snapshot: &EncoderSnapshot, features: Option<&ValuationFeatures>) -> MeritScore {
    MeritScore::new(
        technical_score(snapshot),
        fundamental_score(features, snapshot.week52_percentile),
    )
}
