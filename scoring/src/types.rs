use serde::{Deserialize, Serialize};

/// Externally supplied valuation features for one instrument.
///
/// An upstream pipeline derives these from quarterly filings; this crate
/// only consumes the named values and never computes them. Slopes are the
/// fractional change of the smoothed series over the horizon.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValuationFeatures {
    pub revenue_slope_short: Option<f64>,
    pub fcf_slope_short: Option<f64>,
    pub roe_slope_short: Option<f64>,
    pub net_margin_slope_short: Option<f64>,
    pub pe_slope_short: Option<f64>,
    pub leverage_slope_short: Option<f64>,

    /// Long-horizon counterparts; carried for consumers, not scored.
    pub revenue_slope_long: Option<f64>,
    pub fcf_slope_long: Option<f64>,

    /// Trailing free-cash-flow yield as a fraction of market cap.
    pub fcf_yield: Option<f64>,
}

/// Additive merit total ranking a trade setup.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct MeritScore {
    pub technical: u32,
    pub fundamental: u32,
    pub total: u32,
}

impl MeritScore {
    pub fn new(technical: u32, fundamental: u32) -> Self {
        Self {
            technical,
            fundamental,
            total: technical + fundamental,
        }
    }
}
