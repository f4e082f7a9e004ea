//! Technical merit: additive points from the shape of the run itself.
//!
//! Every table below is calibration data. The highest matching tier wins
//! within a table; tables sum.

use market::encoder::EncoderSnapshot;
use market::types::SignalStrength;

/// Run-length tiers.
const RUN_TIERS: [(usize, u32); 10] = [
    (15, 10),
    (12, 9),
    (10, 8),
    (8, 7),
    (7, 6),
    (6, 5),
    (5, 4),
    (4, 3),
    (3, 2),
    (2, 1),
];

/// Reward-to-risk tiers.
const RR_TIERS: [(f64, u32); 5] = [(3.0, 5), (2.5, 4), (2.0, 3), (1.5, 2), (1.0, 1)];

/// Regime-age tiers, in seconds.
const AGE_TIERS: [(i64, u32); 3] = [(3_600, 3), (1_800, 2), (900, 1)];

pub fn technical_score(snapshot: &EncoderSnapshot) -> u32 {
    let mut score = 0;

    for (min_run, points) in RUN_TIERS {
        if snapshot.run_length >= min_run {
            score += points;
            break;
        }
    }

    if let Some(rr) = snapshot.risk_reward {
        for (min_rr, points) in RR_TIERS {
            if rr >= min_rr {
                score += points;
                break;
            }
        }
    }

    score += match snapshot.signal_strength {
        Some(SignalStrength::VeryStrong) => 4,
        Some(SignalStrength::Strong) => 3,
        Some(SignalStrength::Moderate) => 2,
        Some(SignalStrength::Weak) => 1,
        None => 0,
    };

    for (min_age, points) in AGE_TIERS {
        if snapshot.regime_age_secs >= min_age {
            score += points;
            break;
        }
    }

    score
}
