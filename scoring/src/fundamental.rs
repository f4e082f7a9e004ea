//! Fundamental merit: valuation momentum plus 52-week positioning.
//!
//! Growth slopes reward expansion (score when the value is at or above a
//! tier), P/E and leverage slopes reward contraction (score when at or
//! below a tier), and the 52-week percentile rewards proximity to the low.

use crate::types::ValuationFeatures;

const REVENUE_TIERS: [(f64, u32); 4] = [(0.30, 4), (0.20, 3), (0.10, 2), (0.05, 1)];
const FCF_TIERS: [(f64, u32); 4] = [(0.40, 4), (0.25, 3), (0.10, 2), (0.05, 1)];
const ROE_TIERS: [(f64, u32); 2] = [(0.20, 2), (0.10, 1)];
const MARGIN_TIERS: [(f64, u32); 2] = [(0.20, 2), (0.10, 1)];

const PE_TIERS: [(f64, u32); 3] = [(-0.25, 3), (-0.15, 2), (-0.05, 1)];
const LEVERAGE_TIERS: [(f64, u32); 2] = [(-0.20, 2), (-0.10, 1)];

const WEEK52_TIERS: [(f64, u32); 8] = [
    (5.0, 8),
    (15.0, 7),
    (25.0, 6),
    (35.0, 5),
    (45.0, 4),
    (55.0, 3),
    (65.0, 2),
    (75.0, 1),
];

const FCF_YIELD_TIERS: [(f64, u32); 3] = [(0.15, 3), (0.10, 2), (0.05, 1)];

fn rising(value: Option<f64>, tiers: &[(f64, u32)]) -> u32 {
    match value {
        Some(v) => tiers
            .iter()
            .find(|(t, _)| v >= *t)
            .map(|(_, p)| *p)
            .unwrap_or(0),
        None => 0,
    }
}

fn falling(value: Option<f64>, tiers: &[(f64, u32)]) -> u32 {
    match value {
        Some(v) => tiers
            .iter()
            .find(|(t, _)| v <= *t)
            .map(|(_, p)| *p)
            .unwrap_or(0),
        None => 0,
    }
}

pub fn fundamental_score(
    features: Option<&ValuationFeatures>,
    week52_percentile: Option<f64>,
) -> u32 {
    let near_low = falling(week52_percentile, &WEEK52_TIERS);

    let Some(f) = features else {
        // No features for this instrument: 52-week positioning only.
        return near_low;
    };

    let mut score = near_low;
    score += rising(f.revenue_slope_short, &REVENUE_TIERS);
    score += rising(f.fcf_slope_short, &FCF_TIERS);
    score += rising(f.roe_slope_short, &ROE_TIERS);
    score += rising(f.net_margin_slope_short, &MARGIN_TIERS);
    score += falling(f.pe_slope_short, &PE_TIERS);
    score += falling(f.leverage_slope_short, &LEVERAGE_TIERS);
    score += rising(f.fcf_yield, &FCF_YIELD_TIERS);
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_features_fall_back_to_week52_only() {
        assert_eq!(fundamental_score(None, None), 0);
        assert_eq!(fundamental_score(None, Some(3.0)), 8);
        assert_eq!(fundamental_score(None, Some(50.0)), 3);
        assert_eq!(fundamental_score(None, Some(80.0)), 0);
    }

    #[test]
    fn growth_slopes_reward_expansion() {
        let f = ValuationFeatures {
            revenue_slope_short: Some(0.35),
            fcf_slope_short: Some(0.26),
            roe_slope_short: Some(0.12),
            net_margin_slope_short: Some(0.05),
            ..Default::default()
        };
        // 4 + 3 + 1 + 0, no percentile contribution.
        assert_eq!(fundamental_score(Some(&f), None), 8);
    }

    #[test]
    fn contraction_slopes_reward_decline() {
        let f = ValuationFeatures {
            pe_slope_short: Some(-0.30),
            leverage_slope_short: Some(-0.12),
            ..Default::default()
        };
        assert_eq!(fundamental_score(Some(&f), None), 3 + 1);

        let expanding = ValuationFeatures {
            pe_slope_short: Some(0.10),
            leverage_slope_short: Some(0.10),
            ..Default::default()
        };
        assert_eq!(fundamental_score(Some(&expanding), None), 0);
    }

    #[test]
    fn fcf_yield_rewards_absolute_level() {
        let f = ValuationFeatures {
            fcf_yield: Some(0.16),
            ..Default::default()
        };
        assert_eq!(fundamental_score(Some(&f), None), 3);

        let thin = ValuationFeatures {
            fcf_yield: Some(0.01),
            ..Default::default()
        };
        assert_eq!(fundamental_score(Some(&thin), None), 0);
    }

    #[test]
    fn components_sum() {
        let f = ValuationFeatures {
            revenue_slope_short: Some(0.30),
            fcf_slope_short: Some(0.40),
            roe_slope_short: Some(0.20),
            net_margin_slope_short: Some(0.20),
            pe_slope_short: Some(-0.25),
            leverage_slope_short: Some(-0.20),
            fcf_yield: Some(0.15),
            ..Default::default()
        };
        // 4 + 4 + 2 + 2 + 3 + 2 + 3 plus the deepest percentile tier.
        assert_eq!(fundamental_score(Some(&f), Some(0.0)), 20 + 8);
    }

    #[test]
    fn long_horizon_slopes_do_not_score() {
        let f = ValuationFeatures {
            revenue_slope_long: Some(5.0),
            fcf_slope_long: Some(5.0),
            ..Default::default()
        };
        assert_eq!(fundamental_score(Some(&f), None), 0);
    }
}
