//! Weighted scoring and thresholding across all assets.
//!
//! score = Σ(w_i · c_i) / Σ w_i
//!
//! over the five components, with the volatility and volume gates in {0, 1}.
//! Putting all weight on one component with a threshold of 1.0 recovers a
//! strict rule on that component alone.
//!
//! When the regime gate is on, bars outside a tradeable regime are forced
//! flat after thresholding.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::components::{trend_component, Component, ComponentFrame};
use super::SignalConfig;
use crate::domain::{MarketPanel, SignalMatrix, Symbol};
use crate::indicators::rolling_mean;

const WEIGHT_EPSILON: f64 = 1e-12;
const THRESHOLD_TOLERANCE: f64 = 1e-12;

/// Output of the combiner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedSignals {
    /// Continuous score in [-1, 1]; NaN where any weighted component is unknown.
    pub score: SignalMatrix,
    /// Thresholded direction in {-1, 0, +1}.
    pub direction: SignalMatrix,
    pub components: BTreeMap<Symbol, ComponentFrame>,
}

#[derive(Debug, Clone)]
pub struct SignalCombiner {
    config: SignalConfig,
}

impl SignalCombiner {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Trend component for every symbol of a panel.
    pub fn trend_matrix(&self, panel: &MarketPanel) -> SignalMatrix {
        let windows = self.config.ema_windows;
        let columns: BTreeMap<Symbol, Vec<f64>> = panel
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(symbol, bars)| (symbol.clone(), trend_component(bars, windows)))
            .collect();
        SignalMatrix::from_parts(panel.index().to_vec(), columns)
    }

    /// Score and direct every asset of `panel`.
    ///
    /// `trend_override` supplies an already-aligned trend (e.g. from a coarser
    /// timeframe). A symbol missing from the override, or with a column of
    /// the wrong length, gets an unknown trend and stays flat.
    pub fn combine(
        &self,
        panel: &MarketPanel,
        trend_override: Option<&SignalMatrix>,
    ) -> CombinedSignals {
        let n = panel.len();
        let per_asset: Vec<(Symbol, ComponentFrame, Vec<f64>, Vec<f64>)> = panel
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(symbol, bars)| {
                let trend = match trend_override {
                    None => trend_component(bars, self.config.ema_windows),
                    Some(m) => match m.column(symbol) {
                        Some(col) if col.len() == n => col.to_vec(),
                        _ => {
                            tracing::warn!(%symbol, "no aligned trend for symbol; skipping asset");
                            vec![f64::NAN; n]
                        }
                    },
                };
                let frame = ComponentFrame::compute(bars, trend, &self.config);
                let score = self.score(&frame);
                let direction = self.directions(&frame, &score);
                (symbol.clone(), frame, score, direction)
            })
            .collect();

        let mut scores = BTreeMap::new();
        let mut directions = BTreeMap::new();
        let mut components = BTreeMap::new();
        for (symbol, frame, score, direction) in per_asset {
            scores.insert(symbol.clone(), score);
            directions.insert(symbol.clone(), direction);
            components.insert(symbol, frame);
        }

        let index = panel.index().to_vec();
        CombinedSignals {
            score: SignalMatrix::from_parts(index.clone(), scores),
            direction: SignalMatrix::from_parts(index, directions),
            components,
        }
    }

    /// Weighted score for each bar of one asset, smoothed if configured.
    pub fn score(&self, frame: &ComponentFrame) -> Vec<f64> {
        let weights = &self.config.weights;
        let total = weights.total().max(WEIGHT_EPSILON);

        let raw: Vec<f64> = (0..frame.len())
            .map(|i| {
                let mut sum = 0.0;
                for component in Component::ALL {
                    let w = weights.get(component);
                    if w == 0.0 {
                        continue;
                    }
                    let value = frame.get(component)[i];
                    if value.is_nan() {
                        return f64::NAN;
                    }
                    sum += w * value;
                }
                sum / total
            })
            .collect();

        match self.config.smoothing() {
            Some(window) => {
                let smoothed = rolling_mean(&raw, window);
                raw.iter()
                    .zip(smoothed)
                    .map(|(r, s)| if r.is_nan() { f64::NAN } else { s })
                    .collect()
            }
            None => raw,
        }
    }

    /// Thresholded directions for one asset, masked by the regime gate if present.
    pub fn directions(&self, frame: &ComponentFrame, score: &[f64]) -> Vec<f64> {
        score
            .iter()
            .enumerate()
            .map(|(i, s)| match frame.regime.as_ref().map(|r| r[i]) {
                Some(r) if r != 1.0 => 0.0,
                _ => self.direction(*s),
            })
            .collect()
    }

    /// sign(score) when |score| reaches the threshold, else flat.
    pub fn direction(&self, score: f64) -> f64 {
        if score.is_nan() || score.abs() < self.config.score_threshold - THRESHOLD_TOLERANCE {
            0.0
        } else {
            score.signum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ComponentWeights;

    fn frame(trend: f64, breakout: f64, volatility: f64, volume: f64, funding: f64) -> ComponentFrame {
        ComponentFrame {
            trend: vec![trend],
            breakout: vec![breakout],
            volatility: vec![volatility],
            volume: vec![volume],
            funding: vec![funding],
            regime: None,
        }
    }

    #[test]
    fn default_weights_score() {
        let combiner = SignalCombiner::new(SignalConfig::default());
        let score = combiner.score(&frame(1.0, 1.0, 1.0, 0.0, 0.0))[0];
        assert!((score - 0.70).abs() < 1e-12);
        assert_eq!(combiner.direction(score), 1.0);
    }

    #[test]
    fn gates_count_toward_the_mean_on_either_side() {
        let combiner = SignalCombiner::new(SignalConfig::default());
        // (-0.30 - 0.25 + 0.15 + 0.15) / 1.0
        let short = combiner.score(&frame(-1.0, -1.0, 1.0, 1.0, 0.0))[0];
        assert!((short + 0.25).abs() < 1e-12);
        assert_eq!(combiner.direction(short), 0.0);
        // gates on their own still add to the score
        let gates = combiner.score(&frame(0.0, 0.0, 1.0, 1.0, 0.0))[0];
        assert!((gates - 0.30).abs() < 1e-12);
        assert_eq!(combiner.direction(gates), 0.0);
    }

    #[test]
    fn short_needs_directional_agreement_without_gates() {
        let combiner = SignalCombiner::new(SignalConfig::default());
        let score = combiner.score(&frame(-1.0, -1.0, 0.0, 0.0, -1.0))[0];
        assert!((score + 0.70).abs() < 1e-12);
        assert_eq!(combiner.direction(score), -1.0);
    }

    #[test]
    fn below_threshold_is_flat() {
        let combiner = SignalCombiner::new(SignalConfig::default());
        let score = combiner.score(&frame(1.0, 0.0, 1.0, 0.0, 0.0))[0];
        assert!((score - 0.45).abs() < 1e-12);
        assert_eq!(combiner.direction(score), 0.0);
    }

    #[test]
    fn nan_component_yields_flat() {
        let combiner = SignalCombiner::new(SignalConfig::default());
        let score = combiner.score(&frame(1.0, f64::NAN, 1.0, 1.0, 1.0))[0];
        assert!(score.is_nan());
        assert_eq!(combiner.direction(score), 0.0);
    }

    #[test]
    fn unweighted_nan_component_is_ignored() {
        let combiner = SignalCombiner::new(SignalConfig::single_component(Component::Trend));
        let score = combiner.score(&frame(1.0, f64::NAN, f64::NAN, f64::NAN, 0.0))[0];
        assert_eq!(score, 1.0);
        assert_eq!(combiner.direction(score), 1.0);
    }

    #[test]
    fn single_component_is_a_strict_rule() {
        let combiner = SignalCombiner::new(SignalConfig::single_component(Component::Breakout));
        assert_eq!(combiner.direction(combiner.score(&frame(0.0, 1.0, 0.0, 0.0, 0.0))[0]), 1.0);
        assert_eq!(combiner.direction(combiner.score(&frame(0.0, -1.0, 0.0, 0.0, 0.0))[0]), -1.0);
        // everything else agreeing does not matter without the breakout
        assert_eq!(combiner.direction(combiner.score(&frame(1.0, 0.0, 1.0, 1.0, 1.0))[0]), 0.0);
    }

    #[test]
    fn regime_mask_flattens_untradeable_bars() {
        let combiner = SignalCombiner::new(SignalConfig::default());
        let f = ComponentFrame {
            trend: vec![1.0; 3],
            breakout: vec![1.0; 3],
            volatility: vec![1.0; 3],
            volume: vec![0.0; 3],
            funding: vec![0.0; 3],
            regime: Some(vec![1.0, 0.0, f64::NAN]),
        };
        let score = combiner.score(&f);
        assert!(score.iter().all(|s| (s - 0.70).abs() < 1e-12));
        assert_eq!(combiner.directions(&f, &score), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_total_weight_is_guarded() {
        let mut config = SignalConfig::default();
        config.weights = ComponentWeights {
            trend: 0.0,
            breakout: 0.0,
            volatility: 0.0,
            volume: 0.0,
            funding: 0.0,
        };
        let combiner = SignalCombiner::new(config);
        let score = combiner.score(&frame(1.0, 1.0, 1.0, 1.0, 1.0))[0];
        assert_eq!(score, 0.0);
    }

    #[test]
    fn smoothing_averages_recent_scores() {
        let mut config = SignalConfig::default();
        config.smoothing_enabled = true;
        config.smoothing_window = 2;
        let combiner = SignalCombiner::new(config);
        let f = ComponentFrame {
            trend: vec![1.0, 0.0],
            breakout: vec![1.0, 0.0],
            volatility: vec![1.0, 1.0],
            volume: vec![0.0, 0.0],
            funding: vec![0.0, 0.0],
            regime: None,
        };
        let s = combiner.score(&f);
        assert!((s[0] - 0.70).abs() < 1e-12);
        // (0.70 + 0.15) / 2
        assert!((s[1] - 0.425).abs() < 1e-12);
    }
}
