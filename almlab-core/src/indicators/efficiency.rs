//! Kaufman efficiency ratio.
//!
//! ER[t] = |close[t] - close[t-n]| / Σ |close[i] - close[i-1]| for i in (t-n, t]
//!
//! 1.0 is a straight line, values near 0 are noise. NaN until `n` prior
//! closes exist or when any close in the window is NaN. A window with no
//! movement at all has ER 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct EfficiencyRatio {
    period: usize,
    name: String,
}

impl EfficiencyRatio {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "efficiency ratio period must be >= 1");
        Self {
            period,
            name: format!("er_{period}"),
        }
    }
}

pub fn efficiency_ratio(closes: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; closes.len()];
    if period == 0 {
        return result;
    }
    for (i, slot) in result.iter_mut().enumerate().skip(period) {
        let window = &closes[i - period..=i];
        if window.iter().any(|c| c.is_nan()) {
            continue;
        }
        let path: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        let net = (window[period] - window[0]).abs();
        *slot = if path > 0.0 { (net / path).min(1.0) } else { 0.0 };
    }
    result
}

impl Indicator for EfficiencyRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        efficiency_ratio(&closes, self.period)
    }
}
