//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR is the simple rolling mean of TR over `period` bars (partial windows
//! at the start of history).

use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    if n == 0 {
        return tr;
    }

    let (h, l) = (bars[0].high, bars[0].low);
    if !h.is_nan() && !l.is_nan() {
        tr[0] = h - l;
    }

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if h.is_nan() || l.is_nan() {
            continue;
        }
        tr[i] = if pc.is_nan() {
            h - l
        } else {
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        };
    }

    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let tr = true_range(bars);
        let mut atr = rolling_mean(&tr, self.period);
        // The current bar must be valid for its ATR to be meaningful.
        for (a, t) in atr.iter_mut().zip(&tr) {
            if t.is_nan() {
                *a = f64::NAN;
            }
        }
        atr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn true_range_uses_gap_from_previous_close() {
        let mut bars = make_bars(&[100.0, 100.0]);
        bars[1].high = 110.0;
        bars[1].low = 108.0;
        let tr = true_range(&bars);
        assert_approx(tr[0], 2.0, DEFAULT_EPSILON);
        // |110 - 100| dominates the 2.0 range
        assert_approx(tr[1], 10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_is_mean_of_true_range() {
        // make_bars ranges: |close - open| + 2
        let bars = make_bars(&[10.0, 11.0, 13.0, 12.0]);
        let atr = Atr::new(2).compute(&bars);
        // TR: [2, 3, 4, 3]
        assert_approx(atr[0], 2.0, DEFAULT_EPSILON);
        assert_approx(atr[1], 2.5, DEFAULT_EPSILON);
        assert_approx(atr[2], 3.5, DEFAULT_EPSILON);
        assert_approx(atr[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn void_bar_yields_nan_atr() {
        let mut bars = make_bars(&[10.0, 11.0, 12.0]);
        bars[2].high = f64::NAN;
        let atr = Atr::new(3).compute(&bars);
        assert!(atr[2].is_nan());
        assert!(atr[1].is_finite());
    }
}
