//! Signal combiner configuration.

use serde::{Deserialize, Serialize};

use super::Component;

/// Relative weight of each component in the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentWeights {
    pub trend: f64,
    pub breakout: f64,
    pub volatility: f64,
    pub volume: f64,
    pub funding: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            trend: 0.30,
            breakout: 0.25,
            volatility: 0.15,
            volume: 0.15,
            funding: 0.15,
        }
    }
}

impl ComponentWeights {
    /// All weight on a single component.
    pub fn only(component: Component) -> Self {
        let mut w = Self {
            trend: 0.0,
            breakout: 0.0,
            volatility: 0.0,
            volume: 0.0,
            funding: 0.0,
        };
        *w.get_mut(component) = 1.0;
        w
    }

    /// Equal weight on every component.
    pub fn equal() -> Self {
        Self {
            trend: 1.0,
            breakout: 1.0,
            volatility: 1.0,
            volume: 1.0,
            funding: 1.0,
        }
    }

    pub fn get(&self, component: Component) -> f64 {
        match component {
            Component::Trend => self.trend,
            Component::Breakout => self.breakout,
            Component::Volatility => self.volatility,
            Component::Volume => self.volume,
            Component::Funding => self.funding,
        }
    }

    fn get_mut(&mut self, component: Component) -> &mut f64 {
        match component {
            Component::Trend => &mut self.trend,
            Component::Breakout => &mut self.breakout,
            Component::Volatility => &mut self.volatility,
            Component::Volume => &mut self.volume,
            Component::Funding => &mut self.funding,
        }
    }

    pub fn total(&self) -> f64 {
        Component::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// Market regime gate built from choppiness, ADX and efficiency ratio.
///
/// When enabled, a bar is tradeable only if CHOP is below `chop_max`, ADX is
/// above `adx_min` and the efficiency ratio reaches `er_min`. Directions on
/// untradeable bars are forced flat; the score itself is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub enabled: bool,
    pub chop_window: usize,
    pub adx_window: usize,
    pub er_window: usize,
    pub chop_max: f64,
    pub adx_min: f64,
    pub er_min: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chop_window: 14,
            adx_window: 14,
            er_window: 20,
            chop_max: 50.0,
            adx_min: 25.0,
            er_min: 0.0,
        }
    }
}

/// Breakout window that stretches as price action gets noisier:
/// `floor(donchian_window / ER)` clamped to `[min_window, max_window]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveDonchianConfig {
    pub enabled: bool,
    pub er_window: usize,
    pub min_window: usize,
    pub max_window: usize,
}

impl Default for AdaptiveDonchianConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            er_window: 20,
            min_window: 10,
            max_window: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Short, medium and long EMA spans for the trend component.
    pub ema_windows: [usize; 3],
    pub donchian_window: usize,
    pub atr_window: usize,
    /// Minimum ATR / close for a bar to count as volatile enough.
    pub volatility_threshold: f64,
    /// Optional maximum ATR / close; above it the bar is not admissible.
    pub volatility_cap: Option<f64>,
    pub volume_window: usize,
    pub volume_multiplier: f64,
    /// Funding magnitude beyond which one side is considered crowded.
    pub funding_threshold: f64,
    pub weights: ComponentWeights,
    /// Minimum |score| for a non-flat direction.
    pub score_threshold: f64,
    /// Replace the score by its rolling mean before thresholding.
    pub smoothing_enabled: bool,
    pub smoothing_window: usize,
    pub regime: RegimeConfig,
    pub adaptive_donchian: AdaptiveDonchianConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            ema_windows: [20, 50, 200],
            donchian_window: 20,
            atr_window: 14,
            volatility_threshold: 0.005,
            volatility_cap: None,
            volume_window: 20,
            volume_multiplier: 1.5,
            funding_threshold: 0.0005,
            weights: ComponentWeights::default(),
            score_threshold: 0.6,
            smoothing_enabled: false,
            smoothing_window: 7,
            regime: RegimeConfig::default(),
            adaptive_donchian: AdaptiveDonchianConfig::default(),
        }
    }
}

impl SignalConfig {
    /// A direction only from one component at full strength. This is the
    /// strict-AND rule expressed as a weighted score.
    pub fn single_component(component: Component) -> Self {
        Self {
            weights: ComponentWeights::only(component),
            score_threshold: 1.0,
            ..Self::default()
        }
    }

    /// Smoothing window in effect, if any.
    pub fn smoothing(&self) -> Option<usize> {
        (self.smoothing_enabled && self.smoothing_window > 1).then_some(self.smoothing_window)
    }
}
