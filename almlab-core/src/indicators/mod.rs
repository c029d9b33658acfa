//! Indicators consumed by the signal combiner, the regime gate, the filter's
//! price exits and the weighter.
//!
//! Every indicator is a pure function of bar history: no value at bar t may
//! depend on data from bar t+1 or later. NaN inputs propagate as NaN.
//!
//! Rolling windows accept partial windows at the start of history (the
//! "min_periods = 1" convention), and EMAs are seeded with the first value.
//! Short histories therefore produce usable values early instead of a long
//! NaN warmup.

pub mod adx;
pub mod atr;
pub mod choppiness;
pub mod donchian;
pub mod efficiency;
pub mod ema;
pub mod rolling;

pub use adx::{directional_movement, Adx};
pub use atr::{true_range, Atr};
pub use choppiness::Choppiness;
pub use donchian::{adaptive_donchian, Donchian, DonchianBand};
pub use efficiency::{efficiency_ratio, EfficiencyRatio};
pub use ema::{ema_of_series, Ema};
pub use rolling::{rolling_mean, rolling_std, simple_returns, VolumeMean};

use crate::domain::Bar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_20", "atr_14").
    fn name(&self) -> &str;

    /// Bars of history the indicator looks back over (excluding the current bar).
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Create synthetic hourly bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "TEST".to_string(),
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
                funding_rate: None,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
