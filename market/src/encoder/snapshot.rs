//! Point-in-time projection of an encoder.
//!
//! Rebuilt from scratch on every cache cycle and never mutated; all
//! derived fields degrade to `None` when their inputs are unavailable.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Bit, Direction, SignalStrength, Threshold, Week52};

use super::Encoder;

/// Number of trailing bits echoed into a snapshot.
const RECENT_BITS: usize = 15;

#[derive(Clone, Debug, Serialize)]
pub struct EncoderSnapshot {
    pub symbol: String,
    pub is_etf: bool,
    pub threshold: Threshold,
    pub threshold_pct: f64,

    pub run_length: usize,
    pub total_bits: u64,
    pub recent_bits: Vec<Bit>,

    pub price: f64,
    pub direction: Option<Direction>,
    pub signal_strength: Option<SignalStrength>,

    pub anchor_price: Option<f64>,
    pub anchor_ts: Option<DateTime<Utc>>,
    /// Seconds the current regime has been open; 0 without a regime.
    pub regime_age_secs: i64,
    /// Percent price change from the regime anchor.
    pub regime_price_change_pct: Option<f64>,

    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub risk_reward: Option<f64>,
    pub distance_to_tp_pct: Option<f64>,
    pub distance_to_sl_pct: Option<f64>,

    pub week52_percentile: Option<f64>,
    /// Average daily volume in millions of shares.
    pub avg_volume_m: f64,
    pub is_tradable: bool,
}

/// Reward-to-risk ratio for a proposed entry.
///
/// Positive risk and reward give the ratio; positive risk with non-positive
/// reward gives 0; non-positive risk is undefined.
pub fn risk_reward(reward: f64, risk: f64) -> Option<f64> {
    if risk > 0.0 {
        if reward > 0.0 {
            Some(reward / risk)
        } else {
            Some(0.0)
        }
    } else {
        None
    }
}

/// Where `price` sits inside the 52-week range, clamped to [0, 100].
pub fn week52_percentile(price: f64, week52: Option<&Week52>) -> Option<f64> {
    let w = week52?;
    if w.range <= 0.0 {
        return None;
    }
    Some(((price - w.low) / w.range * 100.0).clamp(0.0, 100.0))
}

impl Encoder {
    /// Project the current state.
    ///
    /// `live_override` substitutes the ingestion price when available;
    /// otherwise the last price this encoder processed is used. Must be
    /// called under the same lock as [`Encoder::process`].
    pub fn snapshot(
        &self,
        live_override: Option<f64>,
        week52: Option<&Week52>,
        min_tradable_run: usize,
        now: DateTime<Utc>,
    ) -> EncoderSnapshot {
        let price = live_override.unwrap_or(self.live_price);

        let (anchor_price, anchor_ts, regime_age_secs, regime_price_change_pct) =
            match self.regime.as_ref() {
                Some(regime) => (
                    Some(regime.anchor_price),
                    Some(regime.anchor_ts),
                    regime.age(now).num_seconds().max(0),
                    Some(regime.price_change_pct(price)),
                ),
                None => (None, None, 0, None),
            };

        let mut take_profit = None;
        let mut stop_loss = None;
        let mut rr = None;
        let mut distance_to_tp_pct = None;
        let mut distance_to_sl_pct = None;

        if let Some(direction) = self.direction {
            if self.run_length >= 2 {
                let (tp, sl, reward, risk) = match direction {
                    Direction::Long => (
                        self.upper_band,
                        self.lower_band,
                        self.upper_band - price,
                        price - self.lower_band,
                    ),
                    Direction::Short => (
                        self.lower_band,
                        self.upper_band,
                        price - self.lower_band,
                        self.upper_band - price,
                    ),
                };
                take_profit = Some(tp);
                stop_loss = Some(sl);
                rr = risk_reward(reward, risk);
                if price > 0.0 {
                    distance_to_tp_pct = Some((tp - price).abs() / price * 100.0);
                    distance_to_sl_pct = Some((sl - price).abs() / price * 100.0);
                }
            }
        }

        let recent_bits = self
            .bits
            .iter()
            .rev()
            .take(RECENT_BITS)
            .rev()
            .map(|b| b.bit)
            .collect();

        EncoderSnapshot {
            symbol: self.symbol.clone(),
            is_etf: self.is_etf,
            threshold: self.threshold,
            threshold_pct: self.threshold.pct(),
            run_length: self.run_length,
            total_bits: self.total_bits,
            recent_bits,
            price,
            direction: self.direction,
            signal_strength: self.signal_strength,
            anchor_price,
            anchor_ts,
            regime_age_secs,
            regime_price_change_pct,
            take_profit,
            stop_loss,
            risk_reward: rr,
            distance_to_tp_pct,
            distance_to_sl_pct,
            week52_percentile: week52_percentile(price, week52),
            avg_volume_m: self.avg_volume_m,
            is_tradable: self.is_tradable(min_tradable_run),
        }
    }
}
