//! Component signals, one series per component per asset.
//!
//! Directional components (trend, breakout, funding) take values in {-1, 0, +1}.
//! Confirmation components (volatility, volume) are gates in {0, 1}.
//! NaN means "unknown at this bar"; funding is 0 when the venue reports none.
//!
//! The optional regime series is not a scored component: it is a {0, 1} mask
//! the combiner applies to directions after thresholding.

use serde::{Deserialize, Serialize};

use super::config::{AdaptiveDonchianConfig, RegimeConfig};
use super::SignalConfig;
use crate::domain::Bar;
use crate::indicators::{
    adaptive_donchian, efficiency_ratio, Adx, Atr, Choppiness, Donchian, DonchianBand, Ema,
    Indicator, VolumeMean,
};

/// Lowest efficiency ratio used when stretching the breakout window.
const MIN_EFFICIENCY: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Trend,
    Breakout,
    Volatility,
    Volume,
    Funding,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::Trend,
        Component::Breakout,
        Component::Volatility,
        Component::Volume,
        Component::Funding,
    ];

    /// Directional components carry a sign; the rest only confirm.
    pub fn is_directional(&self) -> bool {
        matches!(
            self,
            Component::Trend | Component::Breakout | Component::Funding
        )
    }
}

/// Component series for one asset, all the same length as its bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentFrame {
    pub trend: Vec<f64>,
    pub breakout: Vec<f64>,
    pub volatility: Vec<f64>,
    pub volume: Vec<f64>,
    pub funding: Vec<f64>,
    /// 1 where the market regime is tradeable; absent when the gate is off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regime: Option<Vec<f64>>,
}

impl ComponentFrame {
    pub fn compute(bars: &[Bar], trend: Vec<f64>, config: &SignalConfig) -> Self {
        let breakout = if config.adaptive_donchian.enabled {
            adaptive_breakout_component(bars, config.donchian_window, &config.adaptive_donchian)
        } else {
            breakout_component(bars, config.donchian_window)
        };
        Self {
            trend,
            breakout,
            volatility: volatility_component(
                bars,
                config.atr_window,
                config.volatility_threshold,
                config.volatility_cap,
            ),
            volume: volume_component(bars, config.volume_window, config.volume_multiplier),
            funding: funding_component(bars, config.funding_threshold),
            regime: config
                .regime
                .enabled
                .then(|| regime_component(bars, &config.regime)),
        }
    }

    pub fn get(&self, component: Component) -> &[f64] {
        match component {
            Component::Trend => &self.trend,
            Component::Breakout => &self.breakout,
            Component::Volatility => &self.volatility,
            Component::Volume => &self.volume,
            Component::Funding => &self.funding,
        }
    }

    pub fn len(&self) -> usize {
        self.trend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trend.is_empty()
    }
}

/// +1 when close > short EMA > medium EMA > long EMA, -1 for the mirror, else 0.
pub fn trend_component(bars: &[Bar], windows: [usize; 3]) -> Vec<f64> {
    let [short, medium, long] = windows.map(|w| Ema::new(w.max(1)).compute(bars));
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let (c, s, m, l) = (bar.close, short[i], medium[i], long[i]);
            if c.is_nan() || s.is_nan() || m.is_nan() || l.is_nan() {
                f64::NAN
            } else if c > s && s > m && m > l {
                1.0
            } else if c < s && s < m && m < l {
                -1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// +1 when close breaks above the prior Donchian high, -1 below the prior low.
pub fn breakout_component(bars: &[Bar], window: usize) -> Vec<f64> {
    let upper = Donchian::upper(window.max(1)).compute(bars);
    let lower = Donchian::lower(window.max(1)).compute(bars);
    breakout_signal(bars, &upper, &lower)
}

/// Per-bar breakout window `floor(base / ER)` clamped to the configured range.
/// An unknown ER uses the widest window.
pub fn adaptive_windows(bars: &[Bar], base: usize, config: &AdaptiveDonchianConfig) -> Vec<usize> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let min = config.min_window.max(1);
    let max = config.max_window.max(min);
    efficiency_ratio(&closes, config.er_window.max(1))
        .into_iter()
        .map(|er| {
            if er.is_nan() {
                return max;
            }
            let stretched = (base as f64 / er.clamp(MIN_EFFICIENCY, 1.0)).floor();
            (stretched as usize).clamp(min, max)
        })
        .collect()
}

/// Breakout against a Donchian channel whose window adapts to the efficiency ratio.
pub fn adaptive_breakout_component(
    bars: &[Bar],
    base: usize,
    config: &AdaptiveDonchianConfig,
) -> Vec<f64> {
    let windows = adaptive_windows(bars, base, config);
    let upper = adaptive_donchian(bars, &windows, DonchianBand::Upper);
    let lower = adaptive_donchian(bars, &windows, DonchianBand::Lower);
    breakout_signal(bars, &upper, &lower)
}

fn breakout_signal(bars: &[Bar], upper: &[f64], lower: &[f64]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let (c, u, l) = (bar.close, upper[i], lower[i]);
            if c.is_nan() || u.is_nan() || l.is_nan() {
                f64::NAN
            } else if c > u {
                1.0
            } else if c < l {
                -1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// 1 when the market is trending enough to trade: CHOP below its ceiling,
/// ADX above its floor and ER at or above its floor. NaN while any input
/// is still unknown.
pub fn regime_component(bars: &[Bar], config: &RegimeConfig) -> Vec<f64> {
    let chop = Choppiness::new(config.chop_window.max(2)).compute(bars);
    let adx = Adx::new(config.adx_window.max(1)).compute(bars);
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let er = efficiency_ratio(&closes, config.er_window.max(1));
    let needs_er = config.er_min > 0.0;

    (0..bars.len())
        .map(|i| {
            if chop[i].is_nan() || adx[i].is_nan() || (needs_er && er[i].is_nan()) {
                return f64::NAN;
            }
            let tradeable = chop[i] < config.chop_max
                && adx[i] > config.adx_min
                && (!needs_er || er[i] >= config.er_min);
            if tradeable {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// 1 when ATR / close exceeds `threshold` (and stays within `cap`, if set).
pub fn volatility_component(
    bars: &[Bar],
    atr_window: usize,
    threshold: f64,
    cap: Option<f64>,
) -> Vec<f64> {
    let atr = Atr::new(atr_window.max(1)).compute(bars);
    bars.iter()
        .zip(&atr)
        .map(|(bar, a)| {
            if bar.close.is_nan() || a.is_nan() || bar.close <= 0.0 {
                return f64::NAN;
            }
            let ratio = a / bar.close;
            let admissible = ratio > threshold && cap.map_or(true, |c| ratio <= c);
            if admissible {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// 1 when volume exceeds `multiplier` times its trailing mean.
pub fn volume_component(bars: &[Bar], window: usize, multiplier: f64) -> Vec<f64> {
    let mean = VolumeMean::new(window.max(1)).compute(bars);
    bars.iter()
        .zip(&mean)
        .map(|(bar, m)| {
            if bar.is_void() || m.is_nan() {
                f64::NAN
            } else if bar.volume > multiplier * m {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Funding bias: deeply negative funding (crowded shorts) favours longs and
/// deeply positive funding favours shorts. Missing funding is neutral.
pub fn funding_component(bars: &[Bar], threshold: f64) -> Vec<f64> {
    bars.iter()
        .map(|bar| match bar.funding_rate {
            Some(rate) if rate.is_nan() => 0.0,
            Some(rate) if rate <= -threshold => 1.0,
            Some(rate) if rate >= threshold => -1.0,
            _ => 0.0,
        })
        .collect()
}
