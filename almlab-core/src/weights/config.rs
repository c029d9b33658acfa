//! Weighting configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolTargetConfig {
    /// Annualized portfolio volatility to aim for.
    pub target: f64,
    /// Trailing bars used to estimate portfolio volatility.
    pub lookback_bars: usize,
    /// Upper bound on the leverage multiplier.
    pub max_scale: f64,
}

impl Default for VolTargetConfig {
    fn default() -> Self {
        Self {
            target: 0.15,
            lookback_bars: 20,
            max_scale: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Trailing window, in days, for each asset's realized volatility.
    pub inverse_vol_lookback_days: f64,
    pub vol_epsilon: f64,
    /// Global multiplier applied after normalization.
    pub exposure_scalar: f64,
    pub vol_target: Option<VolTargetConfig>,
    /// Fractional tolerance around the proposed weight; `None` disables the buffer.
    pub rebalance_buffer: Option<f64>,
    pub max_position: f64,
    pub max_gross_leverage: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            inverse_vol_lookback_days: 30.0,
            vol_epsilon: 1e-10,
            exposure_scalar: 1.0,
            vol_target: None,
            rebalance_buffer: Some(0.10),
            max_position: 0.20,
            max_gross_leverage: 1.0,
        }
    }
}

impl WeightConfig {
    /// Lookback in bars for a panel with `bars_per_day` bars per day (at least 2).
    pub fn lookback_bars(&self, bars_per_day: f64) -> usize {
        ((self.inverse_vol_lookback_days * bars_per_day).round() as usize).max(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_days_of_hourly_bars() {
        assert_eq!(WeightConfig::default().lookback_bars(24.0), 720);
    }

    #[test]
    fn lookback_never_below_two() {
        let cfg = WeightConfig {
            inverse_vol_lookback_days: 0.0,
            ..WeightConfig::default()
        };
        assert_eq!(cfg.lookback_bars(24.0), 2);
    }
}
