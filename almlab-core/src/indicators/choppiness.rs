//! Choppiness index (CHOP), 0..=100.
//!
//! CHOP[t] = 100 · log10(Σ TR / (max high − min low)) / log10(n)
//!
//! over the `n` bars ending at t. High values mean range-bound, low values
//! mean trending. Needs a full window of valid bars; a window with no range
//! reads as fully choppy.

use super::atr::true_range;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Choppiness {
    period: usize,
    name: String,
}

impl Choppiness {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "choppiness period must be >= 2");
        Self {
            period,
            name: format!("chop_{period}"),
        }
    }
}

impl Indicator for Choppiness {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = self.period;
        let tr = true_range(bars);
        let log_n = (n as f64).log10();
        let mut result = vec![f64::NAN; bars.len()];

        for (i, slot) in result.iter_mut().enumerate().skip(n - 1) {
            let window = &bars[i + 1 - n..=i];
            let tr_window = &tr[i + 1 - n..=i];
            if window.iter().any(|b| b.high.is_nan() || b.low.is_nan())
                || tr_window.iter().any(|t| t.is_nan())
            {
                continue;
            }
            let tr_sum: f64 = tr_window.iter().sum();
            let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = high - low;
            *slot = if range > 0.0 && tr_sum > 0.0 {
                (100.0 * (tr_sum / range).log10() / log_n).clamp(0.0, 100.0)
            } else {
                100.0
            };
        }

        result
    }
}
