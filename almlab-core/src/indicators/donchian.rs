//! Donchian Channel over the bars *preceding* the current one.
//!
//! - Upper[t]: max(high[t-period..t-1])
//! - Lower[t]: min(low[t-period..t-1])
//!
//! The one-bar lag lets a close be compared against the channel it is trying
//! to break. Bar 0 has no prior bars and is NaN; until `period` bars exist the
//! channel spans whatever history is available. NaN bars inside the window
//! are skipped.

use super::Indicator;
use crate::domain::Bar;

/// Which band of the Donchian channel to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonchianBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    name: String,
}

impl Donchian {
    pub fn upper(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            band: DonchianBand::Upper,
            name: format!("donchian_upper_{period}"),
        }
    }

    pub fn lower(period: usize) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        Self {
            period,
            band: DonchianBand::Lower,
            name: format!("donchian_lower_{period}"),
        }
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut result = vec![f64::NAN; bars.len()];
        for (i, slot) in result.iter_mut().enumerate().skip(1) {
            *slot = band_extreme(&bars[i.saturating_sub(self.period)..i], self.band);
        }
        result
    }
}

/// Donchian band whose window varies per bar: `windows[t]` bars preceding t.
pub fn adaptive_donchian(bars: &[Bar], windows: &[usize], band: DonchianBand) -> Vec<f64> {
    let mut result = vec![f64::NAN; bars.len()];
    for (i, (slot, window)) in result.iter_mut().zip(windows).enumerate().skip(1) {
        *slot = band_extreme(&bars[i.saturating_sub((*window).max(1))..i], band);
    }
    result
}

fn band_extreme(window: &[Bar], band: DonchianBand) -> f64 {
    let extreme = match band {
        DonchianBand::Upper => window
            .iter()
            .map(|b| b.high)
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v)))),
        DonchianBand::Lower => window
            .iter()
            .map(|b| b.low)
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v)))),
    };
    extreme.unwrap_or(f64::NAN)
}
