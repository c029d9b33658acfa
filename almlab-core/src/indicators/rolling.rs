//! Trailing-window statistics over arbitrary series.

use super::Indicator;
use crate::domain::Bar;

/// Trailing mean over up to `window` values ending at t (inclusive).
///
/// NaN values inside the window are skipped; a window with no valid values
/// yields NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if window == 0 {
        return result;
    }
    for (i, slot) in result.iter_mut().enumerate() {
        let start = (i + 1).saturating_sub(window);
        let (sum, count) = values[start..=i]
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count > 0 {
            *slot = sum / count as f64;
        }
    }
    result
}

/// Trailing sample standard deviation over up to `window` values ending at t.
///
/// Needs at least two valid observations in the window, else NaN.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if window < 2 {
        return result;
    }
    for (i, slot) in result.iter_mut().enumerate() {
        let start = (i + 1).saturating_sub(window);
        let valid: Vec<f64> = values[start..=i]
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        if valid.len() < 2 {
            continue;
        }
        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        let var =
            valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (valid.len() - 1) as f64;
        *slot = var.sqrt();
    }
    result
}

/// Bar-over-bar simple returns. r[0] is NaN, as is any return touching a NaN price.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    let mut result = vec![f64::NAN; prices.len()];
    for i in 1..prices.len() {
        let (prev, cur) = (prices[i - 1], prices[i]);
        if prev.is_nan() || cur.is_nan() || prev <= 0.0 {
            continue;
        }
        result[i] = cur / prev - 1.0;
    }
    result
}

/// Trailing mean of volume, including the current bar.
#[derive(Debug, Clone)]
pub struct VolumeMean {
    period: usize,
    name: String,
}

impl VolumeMean {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume mean period must be >= 1");
        Self {
            period,
            name: format!("volume_mean_{period}"),
        }
    }
}

impl Indicator for VolumeMean {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let volumes: Vec<f64> = bars
            .iter()
            .map(|b| if b.is_void() { f64::NAN } else { b.volume })
            .collect();
        rolling_mean(&volumes, self.period)
    }
}
