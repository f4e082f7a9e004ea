//! Band-crossing encoder.
//!
//! One `Encoder` exists per (instrument, sensitivity) pair. It converts a
//! price stream into directional bits: whenever the price reaches or escapes
//! the band around the reference price, one bit per whole band width crossed
//! is appended and the band re-anchors at the new price. A contiguous run of
//! matching bits ("stasis") marks consolidation and opens a [`StasisRegime`].
//!
//! The encoder is a pure state machine: no I/O, no clocks. Callers supply
//! price and timestamp; the registry wraps each encoder in its own lock.

pub mod snapshot;

pub use snapshot::{EncoderSnapshot, risk_reward, week52_percentile};

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::types::{Bit, BitEntry, Direction, SignalStrength, Threshold};

/// Maximum number of bits retained per encoder; oldest evict first.
pub const BIT_CAPACITY: usize = 500;

/// Run polarity: the newest bit of a matching run sets the trade direction.
/// An up run (price repeatedly escaping above the band) reads as LONG, a
/// down run as SHORT; take-profit sits at the far band in that direction.
pub const LONG_BIT: Bit = Bit::Up;

/// Average daily volume floor (millions of shares) below which a row is
/// never flagged tradable.
pub const MIN_TRADABLE_VOLUME_M: f64 = 1.0;

/// Open consolidation interval. Exists exactly while the run length is ≥ 2.
#[derive(Clone, Debug)]
pub struct StasisRegime {
    /// Time of the oldest bit of the run that opened the regime.
    pub anchor_ts: DateTime<Utc>,
    /// Price at the anchor bit.
    pub anchor_price: f64,
    /// Longest run length observed while this regime has been open.
    pub peak_run: usize,
}

impl StasisRegime {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.anchor_ts
    }

    /// Percent price change from the anchor to `price`.
    pub fn price_change_pct(&self, price: f64) -> f64 {
        if self.anchor_price != 0.0 {
            (price - self.anchor_price) / self.anchor_price * 100.0
        } else {
            0.0
        }
    }
}

pub struct Encoder {
    symbol: String,
    threshold: Threshold,
    is_etf: bool,
    /// Average daily volume in millions of shares, from reference data.
    avg_volume_m: f64,

    reference_price: f64,
    band_width: f64,
    upper_band: f64,
    lower_band: f64,

    bits: VecDeque<BitEntry>,
    run_length: usize,
    last_bit: Option<Bit>,
    direction: Option<Direction>,
    signal_strength: Option<SignalStrength>,
    regime: Option<StasisRegime>,

    live_price: f64,
    last_update: DateTime<Utc>,
    total_bits: u64,
}

impl Encoder {
    pub fn new(
        symbol: impl Into<String>,
        threshold: Threshold,
        is_etf: bool,
        avg_volume_m: f64,
        initial_price: f64,
        ts: DateTime<Utc>,
    ) -> Self {
        let mut encoder = Self {
            symbol: symbol.into(),
            threshold,
            is_etf,
            avg_volume_m,
            reference_price: initial_price,
            band_width: 0.0,
            upper_band: 0.0,
            lower_band: 0.0,
            bits: VecDeque::with_capacity(BIT_CAPACITY),
            run_length: 0,
            last_bit: None,
            direction: None,
            signal_strength: None,
            regime: None,
            live_price: initial_price,
            last_update: ts,
            total_bits: 0,
        };
        encoder.update_bands();
        encoder
    }

    fn update_bands(&mut self) {
        self.band_width = self.threshold.fraction() * self.reference_price;
        self.upper_band = self.reference_price + self.band_width;
        self.lower_band = self.reference_price - self.band_width;
    }

    /// Feed one price observation.
    ///
    /// The live price is recorded unconditionally. Bits are emitted only
    /// when the price reaches or escapes the band (the open interval
    /// between the bands emits nothing): one bit per whole band width
    /// crossed, all sharing this call's price and timestamp. Any append
    /// re-anchors the reference price at the current price.
    pub fn process(&mut self, price: f64, ts: DateTime<Utc>) {
        self.live_price = price;
        self.last_update = ts;

        if self.band_width <= 0.0 {
            return;
        }
        if price > self.lower_band && price < self.upper_band {
            return;
        }

        let crossed = ((price - self.reference_price) / self.band_width).trunc() as i64;
        if crossed == 0 {
            return;
        }

        let bit = if crossed > 0 { Bit::Up } else { Bit::Down };
        for _ in 0..crossed.unsigned_abs() {
            self.push_bit(BitEntry { bit, price, ts });
        }
        self.reference_price = price;
        self.update_bands();
        self.recompute_run();
    }

    fn push_bit(&mut self, entry: BitEntry) {
        if self.bits.len() == BIT_CAPACITY {
            self.bits.pop_front();
        }
        self.bits.push_back(entry);
        self.total_bits += 1;
    }

    /// Backward scan from the newest bit: the run grows while adjacent bits
    /// match and stops at the first differing pair. The anchor is the
    /// oldest bit of the matching suffix.
    fn recompute_run(&mut self) {
        self.last_bit = self.bits.back().map(|b| b.bit);

        if self.bits.len() < 2 {
            self.run_length = self.bits.len();
            self.direction = None;
            self.signal_strength = None;
            return;
        }

        let mut run = 1;
        let mut anchor = self.bits.len() - 1;
        for i in (1..self.bits.len()).rev() {
            if self.bits[i].bit == self.bits[i - 1].bit {
                run += 1;
                anchor = i - 1;
            } else {
                break;
            }
        }

        let prev = self.run_length;
        self.run_length = run;

        if prev < 2 && run >= 2 {
            let a = &self.bits[anchor];
            self.regime = Some(StasisRegime {
                anchor_ts: a.ts,
                anchor_price: a.price,
                peak_run: run,
            });
        } else if run >= 2 {
            if let Some(regime) = self.regime.as_mut() {
                if run > regime.peak_run {
                    regime.peak_run = run;
                }
            }
        } else if prev >= 2 {
            self.regime = None;
        }

        if run >= 2 {
            let newest = self.bits[self.bits.len() - 1].bit;
            self.direction = Some(if newest == LONG_BIT {
                Direction::Long
            } else {
                Direction::Short
            });
            self.signal_strength = SignalStrength::from_run(run);
        } else {
            self.direction = None;
            self.signal_strength = None;
        }
    }

    /// Tradability gate: long-enough run, defined direction, enough volume.
    /// Each condition gates independently.
    pub fn is_tradable(&self, min_run: usize) -> bool {
        self.run_length >= min_run
            && self.direction.is_some()
            && self.avg_volume_m > MIN_TRADABLE_VOLUME_M
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn reference_price(&self) -> f64 {
        self.reference_price
    }

    pub fn band_width(&self) -> f64 {
        self.band_width
    }

    pub fn upper_band(&self) -> f64 {
        self.upper_band
    }

    pub fn lower_band(&self) -> f64 {
        self.lower_band
    }

    pub fn run_length(&self) -> usize {
        self.run_length
    }

    pub fn last_bit(&self) -> Option<Bit> {
        self.last_bit
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn signal_strength(&self) -> Option<SignalStrength> {
        self.signal_strength
    }

    pub fn regime(&self) -> Option<&StasisRegime> {
        self.regime.as_ref()
    }

    pub fn live_price(&self) -> f64 {
        self.live_price
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    pub fn total_bits(&self) -> u64 {
        self.total_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn encoder(threshold_ppm: u32, initial_price: f64) -> Encoder {
        Encoder::new(
            "SPY",
            Threshold::from_ppm(threshold_ppm),
            true,
            10.0,
            initial_price,
            ts(0),
        )
    }

    /// Drive exactly one crossing in the given direction: half a band
    /// beyond the edge, so float rounding can never truncate it away.
    fn cross(enc: &mut Encoder, bit: Bit, at: i64) {
        let half = enc.band_width() * 0.5;
        let price = match bit {
            Bit::Up => enc.upper_band() + half,
            Bit::Down => enc.lower_band() - half,
        };
        enc.process(price, ts(at));
    }

    #[test]
    fn band_width_tracks_reference_price_exactly() {
        let mut enc = encoder(10_000, 100.0);
        assert_eq!(enc.band_width(), 0.01 * 100.0);

        enc.process(103.0, ts(1));
        assert_eq!(enc.reference_price(), 103.0);
        assert_eq!(enc.band_width(), 0.01 * 103.0);
        assert_eq!(enc.upper_band(), 103.0 + 0.01 * 103.0);
        assert_eq!(enc.lower_band(), 103.0 - 0.01 * 103.0);
    }

    #[test]
    fn prices_inside_the_open_interval_emit_nothing() {
        let mut enc = encoder(10_000, 100.0);
        for price in [99.01, 99.5, 100.0, 100.5, 100.99] {
            enc.process(price, ts(1));
        }
        assert_eq!(enc.bit_count(), 0);
        assert_eq!(enc.reference_price(), 100.0);
        // The live price is observable even without a bit.
        assert_eq!(enc.live_price(), 100.99);
    }

    #[test]
    fn band_boundary_touch_emits() {
        let mut enc = encoder(10_000, 100.0);
        enc.process(101.0, ts(1));
        assert_eq!(enc.bit_count(), 1);
        assert_eq!(enc.reference_price(), 101.0);
    }

    #[test]
    fn whole_band_multiples_emit_one_bit_each() {
        // reference 100, threshold 1% → band width 1, bands [99, 101].
        let mut enc = encoder(10_000, 100.0);
        enc.process(103.0, ts(1));
        assert_eq!(enc.bit_count(), 3);
        assert_eq!(enc.total_bits(), 3);
        assert_eq!(enc.reference_price(), 103.0);
        // All bits from one call share price and timestamp.
        assert_eq!(enc.run_length(), 3);
        assert_eq!(enc.direction(), Some(Direction::Long));
    }

    #[test]
    fn downward_escape_emits_down_bits() {
        let mut enc = encoder(10_000, 100.0);
        enc.process(97.0, ts(1));
        assert_eq!(enc.bit_count(), 3);
        assert_eq!(enc.direction(), Some(Direction::Short));
    }

    #[test]
    fn zero_band_width_emits_nothing() {
        let mut enc = encoder(10_000, 0.0);
        enc.process(50.0, ts(1));
        assert_eq!(enc.bit_count(), 0);
    }

    #[test]
    fn run_length_is_bounded_by_history_and_at_least_one() {
        let mut enc = encoder(10_000, 100.0);
        cross(&mut enc, Bit::Up, 1);
        assert_eq!(enc.run_length(), 1);
        assert!(enc.direction().is_none());

        cross(&mut enc, Bit::Down, 2);
        assert_eq!(enc.run_length(), 1);
        assert!(enc.run_length() <= enc.bit_count());
    }

    #[test]
    fn matching_pair_opens_a_regime_anchored_at_the_older_bit() {
        let mut enc = encoder(10_000, 100.0);
        cross(&mut enc, Bit::Up, 10);
        let anchor_price = enc.live_price();
        cross(&mut enc, Bit::Up, 20);

        assert_eq!(enc.run_length(), 2);
        let regime = enc.regime().expect("regime should be open");
        assert_eq!(regime.anchor_ts, ts(10));
        assert_eq!(regime.anchor_price, anchor_price);
        assert_eq!(regime.peak_run, 2);
    }

    #[test]
    fn peak_run_only_grows_while_open() {
        let mut enc = encoder(10_000, 100.0);
        for t in 1..=5 {
            cross(&mut enc, Bit::Up, t);
        }
        assert_eq!(enc.regime().unwrap().peak_run, 5);

        // A single opposing bit drops the run to 1 and discards the regime.
        cross(&mut enc, Bit::Down, 6);
        assert_eq!(enc.run_length(), 1);
        assert!(enc.regime().is_none());
    }

    #[test]
    fn regime_reopens_after_discard() {
        let mut enc = encoder(10_000, 100.0);
        cross(&mut enc, Bit::Up, 1);
        cross(&mut enc, Bit::Up, 2);
        cross(&mut enc, Bit::Down, 3);
        assert!(enc.regime().is_none());

        cross(&mut enc, Bit::Down, 4);
        let regime = enc.regime().expect("new regime after matching pair");
        assert_eq!(regime.anchor_ts, ts(3));
        assert_eq!(enc.direction(), Some(Direction::Short));
    }

    #[test]
    fn up_run_reads_long_down_run_reads_short() {
        // Pins the polarity constant: newest bit == LONG_BIT ⇒ LONG.
        assert_eq!(LONG_BIT, Bit::Up);

        let mut enc = encoder(10_000, 100.0);
        cross(&mut enc, Bit::Up, 1);
        cross(&mut enc, Bit::Up, 2);
        assert_eq!(enc.direction(), Some(Direction::Long));

        let mut enc = encoder(10_000, 100.0);
        cross(&mut enc, Bit::Down, 1);
        cross(&mut enc, Bit::Down, 2);
        assert_eq!(enc.direction(), Some(Direction::Short));
    }

    #[test]
    fn signal_strength_follows_run_length() {
        let mut enc = encoder(10_000, 100.0);
        cross(&mut enc, Bit::Up, 1);
        cross(&mut enc, Bit::Up, 2);
        assert_eq!(enc.signal_strength(), None);

        cross(&mut enc, Bit::Up, 3);
        assert_eq!(enc.signal_strength(), Some(SignalStrength::Weak));

        for t in 4..=10 {
            cross(&mut enc, Bit::Up, t);
        }
        assert_eq!(enc.signal_strength(), Some(SignalStrength::VeryStrong));
    }

    #[test]
    fn bit_history_is_capped_with_fifo_eviction() {
        let mut enc = encoder(10_000, 100.0);
        for t in 0..(BIT_CAPACITY as i64 + 25) {
            cross(&mut enc, Bit::Up, t + 1);
        }
        assert_eq!(enc.bit_count(), BIT_CAPACITY);
        assert_eq!(enc.total_bits(), BIT_CAPACITY as u64 + 25);
        assert!(enc.run_length() <= BIT_CAPACITY);
    }

    #[test]
    fn tradability_gates_independently() {
        // Run below the minimum.
        let mut enc = encoder(10_000, 100.0);
        cross(&mut enc, Bit::Up, 1);
        cross(&mut enc, Bit::Up, 2);
        assert!(!enc.is_tradable(3));

        // Run at the minimum with direction and volume.
        cross(&mut enc, Bit::Up, 3);
        assert!(enc.is_tradable(3));

        // Direction undefined even though the run satisfies the minimum.
        let mut single = encoder(10_000, 100.0);
        cross(&mut single, Bit::Up, 1);
        assert_eq!(single.run_length(), 1);
        assert!(!single.is_tradable(1));

        // Volume below the floor.
        let mut thin = Encoder::new(
            "SPY",
            Threshold::from_ppm(10_000),
            true,
            0.5,
            100.0,
            ts(0),
        );
        cross(&mut thin, Bit::Up, 1);
        cross(&mut thin, Bit::Up, 2);
        cross(&mut thin, Bit::Up, 3);
        assert!(!thin.is_tradable(3));
    }
}
