//! Run-scoped arena of per-asset filter states and the batch filter.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::state::{ExitReason, FilterConfig, FilterState, PositionState, PriceContext};
use crate::domain::{Bar, MarketPanel, SignalMatrix, Symbol};
use crate::indicators::{Atr, Indicator};

/// One state change of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub bar_index: usize,
    pub from: PositionState,
    pub to: PositionState,
    /// Set on exits only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
}

/// Filter states owned by a single backtest run.
///
/// A state is created the first time its asset is observed and lives until
/// the arena is dropped at the end of the run.
#[derive(Debug, Clone, Default)]
pub struct FilterArena {
    states: HashMap<Symbol, FilterState>,
}

impl FilterArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&FilterState> {
        self.states.get(symbol)
    }

    /// Evaluate one bar for one asset, creating its state on first sight.
    pub fn observe(
        &mut self,
        symbol: &str,
        signal: f64,
        timestamp: DateTime<Utc>,
        config: &FilterConfig,
    ) -> Option<(PositionState, PositionState)> {
        self.observe_with_prices(symbol, signal, timestamp, None, config)
    }

    pub fn observe_with_prices(
        &mut self,
        symbol: &str,
        signal: f64,
        timestamp: DateTime<Utc>,
        prices: Option<PriceContext>,
        config: &FilterConfig,
    ) -> Option<(PositionState, PositionState)> {
        self.states
            .entry(symbol.to_string())
            .or_default()
            .step_with_prices(signal, timestamp, prices, config)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Output of the filter stage.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// Actionable direction per bar in {-1, 0, +1}.
    pub actionable: SignalMatrix,
    /// All transitions, ordered by symbol then bar.
    pub transitions: Vec<Transition>,
    /// Final state of every asset.
    pub arena: FilterArena,
}

#[derive(Debug, Clone)]
pub struct StatefulSignalFilter {
    config: FilterConfig,
}

impl StatefulSignalFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Filter every column of a directional signal matrix.
    pub fn apply(&self, direction: &SignalMatrix) -> FilterOutput {
        self.filter(direction, None)
    }

    /// `apply`, with enabled price exits evaluated against `panel`. Symbols
    /// the panel lacks, or whose bars do not line up, are filtered on
    /// signals alone.
    pub fn apply_with_prices(&self, direction: &SignalMatrix, panel: &MarketPanel) -> FilterOutput {
        self.filter(direction, Some(panel))
    }

    fn filter(&self, direction: &SignalMatrix, panel: Option<&MarketPanel>) -> FilterOutput {
        let index = direction.index();
        let exits = self.config.exits;
        let per_asset: Vec<(Symbol, Vec<f64>, Vec<Transition>, FilterArena)> = direction
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(symbol, column)| {
                let prices = panel
                    .filter(|_| exits.enabled)
                    .and_then(|p| p.bars(symbol))
                    .filter(|bars| bars.len() == column.len())
                    .map(|bars| price_contexts(bars, exits.atr_window));

                let mut arena = FilterArena::new();
                let mut out = Vec::with_capacity(column.len());
                let mut transitions = Vec::new();
                for (i, (signal, ts)) in column.iter().zip(index).enumerate() {
                    let bar_prices = prices.as_ref().map(|p| p[i]);
                    let changed =
                        arena.observe_with_prices(symbol, *signal, *ts, bar_prices, &self.config);
                    let state = arena.get(symbol);
                    if let Some((from, to)) = changed {
                        let exit_reason = if to == PositionState::Flat {
                            state.and_then(|s| s.exit_reason)
                        } else {
                            None
                        };
                        transitions.push(Transition {
                            symbol: symbol.clone(),
                            timestamp: *ts,
                            bar_index: i,
                            from,
                            to,
                            exit_reason,
                        });
                    }
                    let held = state.map_or(PositionState::Flat, |s| s.state);
                    out.push(held.as_signal());
                }
                tracing::debug!(%symbol, transitions = transitions.len(), "filtered signal");
                (symbol.clone(), out, transitions, arena)
            })
            .collect();

        let mut columns = BTreeMap::new();
        let mut transitions = Vec::new();
        let mut arena = FilterArena::new();
        for (symbol, column, mut asset_transitions, asset_arena) in per_asset {
            transitions.append(&mut asset_transitions);
            arena.states.extend(asset_arena.states);
            columns.insert(symbol, column);
        }

        FilterOutput {
            actionable: SignalMatrix::from_parts(index.to_vec(), columns),
            transitions,
            arena,
        }
    }
}

fn price_contexts(bars: &[Bar], atr_window: usize) -> Vec<PriceContext> {
    let atr = Atr::new(atr_window.max(1)).compute(bars);
    bars.iter()
        .zip(atr)
        .map(|(bar, atr)| PriceContext {
            close: bar.close,
            high: bar.high,
            low: bar.low,
            atr,
        })
        .collect()
}
