//! Maps actionable signals to capped portfolio weights, one vector per bar.
//!
//! Per-asset volatility is precomputed in parallel. The walk over time is
//! sequential: each bar collects every active asset before normalizing
//! (the cross-sectional barrier), and the buffer compares against the vector
//! emitted on the previous bar.

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::config::WeightConfig;
use super::sizing::{
    apply_caps, apply_rebalance_buffer, inverse_volatility_weights, vol_target_scale,
    ActiveAsset,
};
use crate::domain::{MarketPanel, SignalMatrix, Symbol, WeightSchedule, WeightVector};
use crate::indicators::{rolling_std, simple_returns};

const GROSS_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct PositionWeighter {
    config: WeightConfig,
}

impl PositionWeighter {
    pub fn new(config: WeightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WeightConfig {
        &self.config
    }

    /// Weight schedule aligned with the panel index.
    ///
    /// Symbols present in `actionable` but not in `panel` never receive weight.
    pub fn weights(&self, panel: &MarketPanel, actionable: &SignalMatrix) -> WeightSchedule {
        let bars_per_year = panel.timeframe().bars_per_year();
        let annualizer = bars_per_year.sqrt();
        let lookback = self
            .config
            .lookback_bars(panel.timeframe().bars_per_day());

        // returns and annualized trailing volatility per asset
        let series: BTreeMap<Symbol, (Vec<f64>, Vec<f64>)> = panel
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(symbol, bars)| {
                let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
                let returns = simple_returns(&closes);
                let vol = rolling_std(&returns, lookback)
                    .into_iter()
                    .map(|s| s * annualizer)
                    .collect();
                (symbol.clone(), (returns, vol))
            })
            .collect();

        let mut schedule = WeightSchedule::default();
        let mut previous = WeightVector::new();

        for (t, timestamp) in panel.index().iter().enumerate() {
            let mut active = Vec::new();
            for (symbol, column) in actionable.iter() {
                let direction = column.get(t).copied().unwrap_or(0.0);
                if direction.is_nan() || direction == 0.0 {
                    continue;
                }
                let Some((_, vol)) = series.get(symbol) else {
                    continue;
                };
                if vol[t].is_nan() {
                    tracing::debug!(%symbol, bar = t, "volatility unavailable; asset skipped");
                    continue;
                }
                active.push(ActiveAsset {
                    symbol: symbol.clone(),
                    direction,
                    volatility: vol[t],
                });
            }

            let mut proposed = inverse_volatility_weights(&active, self.config.vol_epsilon);
            proposed = scale(&proposed, self.config.exposure_scalar);

            if let Some(target) = self.config.vol_target {
                let portfolio_vol =
                    portfolio_volatility(&proposed, &series, t, target.lookback_bars) * annualizer;
                let k = vol_target_scale(
                    portfolio_vol,
                    target.target,
                    target.max_scale,
                    self.config.vol_epsilon,
                );
                proposed = scale(&proposed, k);
            }

            let capped = apply_caps(
                &proposed,
                self.config.max_position,
                self.config.max_gross_leverage,
            );

            let emitted = match self.config.rebalance_buffer {
                Some(buffer) => {
                    let buffered = apply_rebalance_buffer(&previous, &capped, buffer);
                    if buffered.gross() > self.config.max_gross_leverage + GROSS_TOLERANCE {
                        capped
                    } else {
                        buffered
                    }
                }
                None => capped,
            };

            previous = emitted.clone();
            schedule.entries.push((*timestamp, emitted));
        }

        tracing::debug!(
            bars = schedule.len(),
            max_gross = schedule.max_gross(),
            "weights computed"
        );
        schedule
    }
}

fn scale(weights: &WeightVector, k: f64) -> WeightVector {
    let mut out = WeightVector::new();
    for (symbol, w) in weights.iter() {
        out.set(symbol.clone(), w * k);
    }
    out
}

/// Sample std of the returns the current weights would have earned over the
/// trailing `lookback` bars ending at `t`. NaN with fewer than two bars.
fn portfolio_volatility(
    weights: &WeightVector,
    series: &BTreeMap<Symbol, (Vec<f64>, Vec<f64>)>,
    t: usize,
    lookback: usize,
) -> f64 {
    if weights.is_empty() {
        return f64::NAN;
    }
    let start = (t + 1).saturating_sub(lookback).max(1);
    if t < start {
        return f64::NAN;
    }
    let returns: Vec<f64> = (start..=t)
        .map(|s| {
            weights
                .iter()
                .map(|(symbol, w)| {
                    let r = series.get(symbol).map_or(f64::NAN, |(ret, _)| ret[s]);
                    if r.is_nan() {
                        0.0
                    } else {
                        w * r
                    }
                })
                .sum()
        })
        .collect();
    if returns.len() < 2 {
        return f64::NAN;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    var.sqrt()
}
