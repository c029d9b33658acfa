//! Cost stress sweeps and filter comparisons.
//!
//! A stress sweep builds the weight schedule once and replays it under each
//! cost rate in parallel. Signals and weights do not depend on costs, so
//! every scenario trades the same schedule.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use almlab_core::domain::{MarketPanel, WeightSchedule};
use almlab_core::engine::{BacktestResult, CostModel, ExecutionError, ExecutorConfig, SummaryStats};
use almlab_core::filter::FilterConfig;
use almlab_core::pipeline::{execute_schedule, prepare_schedule, PipelineError};

use crate::config::{ConfigError, RunConfig};
use crate::data_loader::LoadedPanel;
use crate::runner::{check_timeframe, resolve_coarse, RunError};

/// Headline statistics of one cost scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressRow {
    /// Symmetric cost rate per unit of traded notional.
    pub cost_rate: f64,
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
    pub annual_turnover: f64,
    pub total_cost: f64,
    pub var_95: f64,
    /// The replay stopped early; statistics cover the partial run.
    pub halted: bool,
}

impl StressRow {
    fn new(cost_rate: f64, result: &BacktestResult) -> Self {
        let s = &result.stats;
        Self {
            cost_rate,
            total_return: s.total_return,
            annual_return: s.annual_return,
            sharpe: s.sharpe,
            sortino: s.sortino,
            max_drawdown: s.max_drawdown,
            calmar: s.calmar,
            annual_turnover: s.annual_turnover,
            total_cost: s.total_cost,
            var_95: s.var_95,
            halted: !result.is_complete(),
        }
    }
}

/// Replay the configured strategy under each cost rate.
///
/// Rows come back sorted by cost rate. A scenario that halts still yields a
/// row built from its partial result.
pub fn run_cost_stress(
    config: &RunConfig,
    fine: &LoadedPanel,
    coarse: Option<&MarketPanel>,
    scenarios: &[f64],
) -> Result<Vec<StressRow>, RunError> {
    config.validate()?;
    if let Some(bad) = scenarios.iter().find(|r| !r.is_finite() || **r < 0.0) {
        return Err(ConfigError::Invalid(format!("cost scenario {bad} must be finite and >= 0")).into());
    }
    check_timeframe(config, &fine.panel)?;
    let coarse = resolve_coarse(config, &fine.panel, coarse)?;
    let pipeline = config.to_pipeline_config();
    let prepared = prepare_schedule(&fine.panel, coarse.as_deref(), &pipeline)?;

    tracing::info!(scenarios = scenarios.len(), "cost stress starting");

    let mut rows = scenarios
        .par_iter()
        .map(|&rate| {
            let executor = ExecutorConfig {
                initial_capital: config.run.initial_capital,
                cost: CostModel::symmetric(rate),
            };
            let result = replay(&fine.panel, &prepared.weights, executor, config)?;
            Ok(StressRow::new(rate, &result))
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    rows.sort_by(|a, b| a.cost_rate.total_cmp(&b.cost_rate));
    Ok(rows)
}

/// Replay a schedule, keeping the partial result of a halted run.
fn replay(
    fine: &MarketPanel,
    weights: &WeightSchedule,
    executor: ExecutorConfig,
    config: &RunConfig,
) -> Result<BacktestResult, RunError> {
    match execute_schedule(fine, weights, executor, config.fill_model()) {
        Ok(result) => Ok(result),
        Err(ExecutionError::Halted { at, reason, partial }) => {
            tracing::error!(
                cost_rate = executor.cost.buy_rate,
                %at,
                %reason,
                "scenario halted; using partial result"
            );
            Ok(*partial)
        }
        Err(e) => Err(PipelineError::from(e).into()),
    }
}

/// Statistics with and without the stateful filter and rebalance buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterComparison {
    /// Every raw signal acted on; weights re-sized every bar.
    pub baseline: SummaryStats,
    /// The configured filter and buffer.
    pub filtered: SummaryStats,
}

impl FilterComparison {
    /// Fractional turnover reduction of the filtered run; 0 when the
    /// baseline never trades.
    pub fn turnover_reduction(&self) -> f64 {
        if self.baseline.total_turnover > 0.0 {
            1.0 - self.filtered.total_turnover / self.baseline.total_turnover
        } else {
            0.0
        }
    }

    pub fn cost_saved(&self) -> f64 {
        self.baseline.total_cost - self.filtered.total_cost
    }
}

/// Run the configured strategy against an unfiltered, unbuffered baseline.
pub fn compare_filtering(
    config: &RunConfig,
    fine: &LoadedPanel,
    coarse: Option<&MarketPanel>,
) -> Result<FilterComparison, RunError> {
    config.validate()?;
    check_timeframe(config, &fine.panel)?;
    let resolved = resolve_coarse(config, &fine.panel, coarse)?;
    let coarse = resolved.as_deref();

    let filtered_cfg = config.to_pipeline_config();
    let mut baseline_cfg = filtered_cfg.clone();
    baseline_cfg.filter = FilterConfig::passthrough();
    baseline_cfg.weights.rebalance_buffer = None;

    let (baseline, filtered) = rayon::join(
        || -> Result<SummaryStats, RunError> {
            let prepared = prepare_schedule(&fine.panel, coarse, &baseline_cfg)?;
            Ok(replay(&fine.panel, &prepared.weights, baseline_cfg.executor, config)?.stats)
        },
        || -> Result<SummaryStats, RunError> {
            let prepared = prepare_schedule(&fine.panel, coarse, &filtered_cfg)?;
            Ok(replay(&fine.panel, &prepared.weights, filtered_cfg.executor, config)?.stats)
        },
    );
    let comparison = FilterComparison {
        baseline: baseline?,
        filtered: filtered?,
    };

    tracing::info!(
        baseline_turnover = comparison.baseline.total_turnover,
        filtered_turnover = comparison.filtered.total_turnover,
        reduction = comparison.turnover_reduction(),
        "filter comparison finished"
    );
    Ok(comparison)
}
