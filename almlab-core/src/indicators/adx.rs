//! ADX: Average Directional Index.
//!
//! Steps:
//! 1. +DM and -DM from consecutive bars
//! 2. Rolling means of +DM, -DM and TR over `period` bars (partial windows)
//! 3. +DI = 100 * mean(+DM) / mean(TR), -DI likewise
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = rolling mean of DX
//!
//! Simple means rather than Wilder's recursion, matching `Atr`.
//! Bar 0 has no directional movement and is NaN.

use super::atr::true_range;
use super::rolling::rolling_mean;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

/// +DM and -DM series. Index 0, and any bar touching a NaN high or low, is NaN.
pub fn directional_movement(bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let (cur, prev) = (&bars[i], &bars[i - 1]);
        if cur.high.is_nan() || cur.low.is_nan() || prev.high.is_nan() || prev.low.is_nan() {
            continue;
        }
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    (plus_dm, minus_dm)
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let (plus_dm, minus_dm) = directional_movement(bars);
        let tr = true_range(bars);
        let mean_tr = rolling_mean(&tr, self.period);
        let mean_plus = rolling_mean(&plus_dm, self.period);
        let mean_minus = rolling_mean(&minus_dm, self.period);

        let dx: Vec<f64> = (0..bars.len())
            .map(|i| {
                let (t, p, m) = (mean_tr[i], mean_plus[i], mean_minus[i]);
                if plus_dm[i].is_nan() || t.is_nan() || p.is_nan() || m.is_nan() || t <= 0.0 {
                    return f64::NAN;
                }
                let plus_di = 100.0 * p / t;
                let minus_di = 100.0 * m / t;
                let di_sum = plus_di + minus_di;
                if di_sum == 0.0 {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / di_sum
                }
            })
            .collect();

        let mut adx = rolling_mean(&dx, self.period);
        for (a, d) in adx.iter_mut().zip(&dx) {
            if d.is_nan() {
                *a = f64::NAN;
            }
        }
        adx
    }
}
