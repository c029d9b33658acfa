//! Sequential replay of a weight schedule: INIT → RUNNING → COMPLETE | FAILED.
//!
//! The vector stamped at bar t-1 (decided on that bar's close) is traded at
//! the open of bar t. For every asset with valid prices on bar t:
//!
//! - held weight earns close[t] / last_valid_close - 1
//! - the traded delta earns close[t] / fill - 1
//! - cost = |delta| × rate(side) × equity[t-1]
//!
//! equity[t] = equity[t-1] × (1 + Σ contributions) - Σ costs
//!
//! An asset with a NaN open or close neither trades nor earns on that bar; its
//! weight carries forward and its return resumes from the last valid close.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cost::{CostModel, TradeSide};
use super::fill::{FillPriceModel, OpenPrice};
use super::result::{BacktestRecord, BacktestResult, RunStatus, SummaryStats, SCHEMA_VERSION};
use crate::domain::{MarketPanel, Symbol, WeightSchedule, WeightVector};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub initial_capital: f64,
    pub cost: CostModel,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            cost: CostModel::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Init,
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("executor is {0:?}; each run needs a fresh executor")]
    NotInitial(RunState),
    #[error("initial capital must be positive and finite, got {0}")]
    InvalidCapital(f64),
    #[error("weight schedule has {schedule} entries but the panel has {panel} bars")]
    LengthMismatch { schedule: usize, panel: usize },
    #[error("schedule timestamp {found} at position {position} does not match panel timestamp {expected}")]
    TimestampMismatch {
        position: usize,
        expected: DateTime<Utc>,
        found: DateTime<Utc>,
    },
    #[error("weight assigned to '{0}', which is not in the panel")]
    UnknownSymbol(Symbol),
    #[error("replay halted at {at}: {reason}")]
    Halted {
        at: DateTime<Utc>,
        reason: String,
        partial: Box<BacktestResult>,
    },
}

impl ExecutionError {
    /// Partial result of a halted run.
    pub fn partial(&self) -> Option<&BacktestResult> {
        match self {
            ExecutionError::Halted { partial, .. } => Some(partial.as_ref()),
            _ => None,
        }
    }
}

pub struct BacktestExecutor {
    config: ExecutorConfig,
    fill_model: Box<dyn FillPriceModel>,
    state: RunState,
}

impl std::fmt::Debug for BacktestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestExecutor")
            .field("config", &self.config)
            .field("fill_model", &self.fill_model.name())
            .field("state", &self.state)
            .finish()
    }
}

impl BacktestExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            fill_model: Box::new(OpenPrice),
            state: RunState::Init,
        }
    }

    pub fn with_fill_model(mut self, fill_model: Box<dyn FillPriceModel>) -> Self {
        self.fill_model = fill_model;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Replay `schedule` against `panel`.
    pub fn run(
        &mut self,
        panel: &MarketPanel,
        schedule: &WeightSchedule,
    ) -> Result<BacktestResult, ExecutionError> {
        if self.state != RunState::Init {
            return Err(ExecutionError::NotInitial(self.state));
        }
        if let Err(e) = self.validate(panel, schedule) {
            self.state = RunState::Failed;
            return Err(e);
        }
        self.state = RunState::Running;

        let bars_per_year = panel.timeframe().bars_per_year();
        let initial = self.config.initial_capital;
        let symbols = panel.symbols();
        let empty = WeightVector::new();

        let mut equity = initial;
        let mut held = WeightVector::new();
        let mut last_close: HashMap<&str, f64> = HashMap::with_capacity(symbols.len());
        let mut records: Vec<BacktestRecord> = Vec::with_capacity(panel.len());

        for (t, timestamp) in panel.index().iter().enumerate() {
            let target = if t == 0 {
                &held
            } else {
                schedule.at(t - 1).unwrap_or(&empty)
            };

            let mut next_held = held.clone();
            let mut contribution = 0.0;
            let mut cost = 0.0;
            let mut turnover = 0.0;

            for symbol in &symbols {
                let Some(bar) = panel.bars(symbol).and_then(|b| b.get(t)) else {
                    continue;
                };
                if !(bar.open > 0.0 && bar.close > 0.0) {
                    continue;
                }

                let w_prev = held.get(symbol);
                if w_prev != 0.0 {
                    if let Some(prev_close) = last_close.get(symbol.as_str()) {
                        contribution += w_prev * (bar.close / prev_close - 1.0);
                    }
                }

                let delta = target.get(symbol) - w_prev;
                if let Some(side) = TradeSide::of_delta(delta) {
                    let fill = self.fill_model.fill_price(bar, side);
                    contribution += delta * (bar.close / fill - 1.0);
                    cost += self.config.cost.trade_cost(delta, equity);
                    turnover += delta.abs();
                    next_held.set(symbol.clone(), w_prev + delta);
                }

                last_close.insert(symbol.as_str(), bar.close);
            }

            let next_equity = equity * (1.0 + contribution) - cost;
            if !next_equity.is_finite() || next_equity <= 0.0 {
                let reason = format!("equity became {next_equity} (previous {equity})");
                tracing::error!(%timestamp, bar = t, %reason, "backtest halted");
                self.state = RunState::Failed;
                let partial = BacktestResult {
                    schema_version: SCHEMA_VERSION,
                    status: RunStatus::Failed {
                        at: *timestamp,
                        reason: reason.clone(),
                    },
                    initial_capital: initial,
                    stats: SummaryStats::compute(&records, initial, bars_per_year),
                    records,
                };
                return Err(ExecutionError::Halted {
                    at: *timestamp,
                    reason,
                    partial: Box::new(partial),
                });
            }

            records.push(BacktestRecord {
                timestamp: *timestamp,
                equity: next_equity,
                turnover,
                cost,
                gross_exposure: next_held.gross(),
            });
            equity = next_equity;
            held = next_held;
        }

        self.state = RunState::Complete;
        let stats = SummaryStats::compute(&records, initial, bars_per_year);
        tracing::info!(
            bars = records.len(),
            total_return = stats.total_return,
            annual_turnover = stats.annual_turnover,
            fill_model = self.fill_model.name(),
            "backtest complete"
        );

        Ok(BacktestResult {
            schema_version: SCHEMA_VERSION,
            status: RunStatus::Complete,
            initial_capital: initial,
            records,
            stats,
        })
    }

    fn validate(&self, panel: &MarketPanel, schedule: &WeightSchedule) -> Result<(), ExecutionError> {
        let capital = self.config.initial_capital;
        if !(capital.is_finite() && capital > 0.0) {
            return Err(ExecutionError::InvalidCapital(capital));
        }
        if schedule.len() != panel.len() {
            return Err(ExecutionError::LengthMismatch {
                schedule: schedule.len(),
                panel: panel.len(),
            });
        }
        for (position, (expected, (found, weights))) in
            panel.index().iter().zip(&schedule.entries).enumerate()
        {
            if expected != found {
                return Err(ExecutionError::TimestampMismatch {
                    position,
                    expected: *expected,
                    found: *found,
                });
            }
            if let Some(unknown) = weights.symbols().find(|s| panel.bars(s).is_none()) {
                return Err(ExecutionError::UnknownSymbol(unknown.clone()));
            }
        }
        Ok(())
    }
}
