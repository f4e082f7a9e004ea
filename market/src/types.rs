use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a single band crossing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bit {
    Up,
    Down,
}

/// Trade direction implied by an open run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse bucketing of run length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl SignalStrength {
    /// Bucket a run length. Runs shorter than 3 carry no strength class.
    pub fn from_run(run: usize) -> Option<Self> {
        match run {
            r if r >= 10 => Some(SignalStrength::VeryStrong),
            r if r >= 7 => Some(SignalStrength::Strong),
            r if r >= 5 => Some(SignalStrength::Moderate),
            r if r >= 3 => Some(SignalStrength::Weak),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Weak => "WEAK",
            SignalStrength::Moderate => "MODERATE",
            SignalStrength::Strong => "STRONG",
            SignalStrength::VeryStrong => "VERY_STRONG",
        }
    }
}

/// One recorded band crossing.
#[derive(Clone, Debug)]
pub struct BitEntry {
    pub bit: Bit,
    pub price: f64,
    pub ts: DateTime<Utc>,
}

/// Band half-width as a fraction of the reference price.
///
/// Stored in integer parts-per-million so stream keys stay `Eq + Hash`
/// (0.00125 == 1_250 ppm).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Threshold(u32);

impl Threshold {
    pub const fn from_ppm(ppm: u32) -> Self {
        Self(ppm)
    }

    pub fn ppm(&self) -> u32 {
        self.0
    }

    /// The fractional sensitivity, e.g. 0.00125.
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// The sensitivity in percent, e.g. 0.125.
    pub fn pct(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = self.pct();
        if pct < 0.1 {
            write!(f, "{pct:.4}%")
        } else if pct < 1.0 {
            write!(f, "{pct:.3}%")
        } else {
            write!(f, "{pct:.2}%")
        }
    }
}

/// Identifies one (instrument, sensitivity) encoder.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub symbol: String,
    pub threshold: Threshold,
}

impl StreamKey {
    pub fn new(symbol: impl Into<String>, threshold: Threshold) -> Self {
        Self {
            symbol: symbol.into(),
            threshold,
        }
    }
}

/// Historical bar as returned by the aggregate endpoint.
#[derive(Clone, Debug)]
pub struct Bar {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// 52-week price context for one instrument.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Week52 {
    pub high: f64,
    pub low: f64,
    pub range: f64,
}

/// Per-instrument reference data loaded once during bootstrap.
#[derive(Clone, Debug, Default)]
pub struct SymbolReference {
    pub week52: Option<Week52>,
    /// Average daily volume in millions of shares.
    pub avg_volume_m: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_fraction_and_pct_agree() {
        let t = Threshold::from_ppm(1_250);
        assert!((t.fraction() - 0.00125).abs() < 1e-12);
        assert!((t.pct() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn threshold_display_scales_precision() {
        assert_eq!(Threshold::from_ppm(625).to_string(), "0.0625%");
        assert_eq!(Threshold::from_ppm(5_000).to_string(), "0.500%");
        assert_eq!(Threshold::from_ppm(100_000).to_string(), "10.00%");
    }

    #[test]
    fn signal_strength_buckets() {
        assert_eq!(SignalStrength::from_run(2), None);
        assert_eq!(SignalStrength::from_run(3), Some(SignalStrength::Weak));
        assert_eq!(SignalStrength::from_run(4), Some(SignalStrength::Weak));
        assert_eq!(SignalStrength::from_run(5), Some(SignalStrength::Moderate));
        assert_eq!(SignalStrength::from_run(7), Some(SignalStrength::Strong));
        assert_eq!(SignalStrength::from_run(10), Some(SignalStrength::VeryStrong));
        assert_eq!(SignalStrength::from_run(25), Some(SignalStrength::VeryStrong));
    }
}
