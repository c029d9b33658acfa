//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (span + 1).
//! Seed: EMA[0] = x[0], so the series is defined from the first bar.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    span: usize,
    name: String,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            span,
            name: format!("ema_{span}"),
        }
    }

    pub fn span(&self) -> usize {
        self.span
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        ema_of_series(&closes, self.span)
    }
}

/// EMA of an arbitrary series.
///
/// A NaN input yields NaN at that bar and restarts the recursion from the
/// next valid value, so a single void bar does not taint the rest of history.
pub fn ema_of_series(values: &[f64], span: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if span == 0 {
        return result;
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev: Option<f64> = None;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            prev = None;
            continue;
        }
        let ema = match prev {
            Some(p) => alpha * v + (1.0 - alpha) * p,
            None => v,
        };
        result[i] = ema;
        prev = Some(ema);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn ema_span_1_equals_close() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        let result = Ema::new(1).compute(&bars);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_known_values() {
        // alpha = 0.5; seed 10
        // EMA[1] = 0.5*11 + 0.5*10 = 10.5
        // EMA[2] = 0.5*12 + 0.5*10.5 = 11.25
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let result = Ema::new(3).compute(&bars);
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 10.5, DEFAULT_EPSILON);
        assert_approx(result[2], 11.25, DEFAULT_EPSILON);
    }

    #[test]
    fn long_span_is_defined_from_first_bar() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0]);
        let result = Ema::new(200).compute(&bars);
        assert!(result.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn faster_ema_tracks_a_rising_series_more_closely() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let fast = ema_of_series(&closes, 20);
        let mid = ema_of_series(&closes, 50);
        let slow = ema_of_series(&closes, 200);
        for i in 1..closes.len() {
            assert!(closes[i] > fast[i]);
            assert!(fast[i] > mid[i]);
            assert!(mid[i] > slow[i]);
        }
    }

    #[test]
    fn nan_restarts_recursion() {
        let result = ema_of_series(&[10.0, f64::NAN, 20.0, 22.0], 3);
        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert!(result[1].is_nan());
        assert_approx(result[2], 20.0, DEFAULT_EPSILON);
        assert_approx(result[3], 21.0, DEFAULT_EPSILON);
    }
}
