//! End-to-end orchestration of the five stages.
//!
//! ```text
//! coarse panel ──trend──► TimeframeAligner ─┐
//!                                           ▼
//! fine panel ─────────────────────► SignalCombiner ─► StatefulSignalFilter
//!      │                                                    │
//!      └──────────────► PositionWeighter ◄──────────────────┘
//!                              │
//!                              ▼
//!                       BacktestExecutor
//! ```
//!
//! Every stage returns a new value; nothing upstream is mutated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::align::{AlignmentError, BarLabel, TimeframeAligner};
use crate::domain::{MarketPanel, Symbol, Timeframe, WeightSchedule};
use crate::engine::{BacktestExecutor, BacktestResult, ExecutionError, ExecutorConfig, FillModelConfig};
use crate::filter::{FilterConfig, FilterOutput, StatefulSignalFilter};
use crate::signal::{CombinedSignals, SignalCombiner, SignalConfig};
use crate::weights::{PositionWeighter, WeightConfig};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("alignment failed: {0}")]
    Alignment(#[from] AlignmentError),
    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),
    #[error("coarse panel is missing symbols: {}", missing.join(", "))]
    SymbolMismatch { missing: Vec<Symbol> },
    #[error("coarse timeframe {coarse} is not coarser than fine timeframe {fine}")]
    TimeframeOrder { fine: Timeframe, coarse: Timeframe },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub signal: SignalConfig,
    pub filter: FilterConfig,
    pub weights: WeightConfig,
    pub executor: ExecutorConfig,
    pub fill_model: FillModelConfig,
}

/// Output of the signal, filter and weight stages.
#[derive(Debug, Clone)]
pub struct PreparedSchedule {
    /// Fine bars with no closed coarse bar; `None` without a coarse panel.
    pub alignment_uncovered: Option<usize>,
    pub combined: CombinedSignals,
    pub filtered: FilterOutput,
    pub weights: WeightSchedule,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub alignment_uncovered: Option<usize>,
    pub combined: CombinedSignals,
    pub filtered: FilterOutput,
    pub weights: WeightSchedule,
    pub result: BacktestResult,
}

/// Run every stage on `fine`, taking the trend from `coarse` when given.
pub fn run_pipeline(
    fine: &MarketPanel,
    coarse: Option<&MarketPanel>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    let prepared = prepare_schedule(fine, coarse, config)?;
    let result = execute_schedule(fine, &prepared.weights, config.executor, config.fill_model)?;
    Ok(PipelineOutput {
        alignment_uncovered: prepared.alignment_uncovered,
        combined: prepared.combined,
        filtered: prepared.filtered,
        weights: prepared.weights,
        result,
    })
}

/// Signal, filter and weight stages. Independent of execution costs.
pub fn prepare_schedule(
    fine: &MarketPanel,
    coarse: Option<&MarketPanel>,
    config: &PipelineConfig,
) -> Result<PreparedSchedule, PipelineError> {
    let combiner = SignalCombiner::new(config.signal.clone());

    let (trend, alignment_uncovered) = match coarse {
        None => (None, None),
        Some(coarse) => {
            if coarse.timeframe().to_seconds() <= fine.timeframe().to_seconds() {
                return Err(PipelineError::TimeframeOrder {
                    fine: fine.timeframe(),
                    coarse: coarse.timeframe(),
                });
            }
            let missing: Vec<Symbol> = fine
                .symbols()
                .into_iter()
                .filter(|s| coarse.bars(s).is_none())
                .collect();
            if !missing.is_empty() {
                return Err(PipelineError::SymbolMismatch { missing });
            }

            let coarse_trend = combiner.trend_matrix(coarse);
            let aligner = TimeframeAligner::new(BarLabel::Open {
                interval: coarse.timeframe().duration(),
            });
            let alignment = aligner.align(&coarse_trend, fine.index())?;
            (Some(alignment.matrix), Some(alignment.uncovered))
        }
    };

    let combined = combiner.combine(fine, trend.as_ref());
    tracing::debug!(
        symbols = combined.direction.symbols().len(),
        bars = combined.direction.len(),
        "signals combined"
    );

    let filtered =
        StatefulSignalFilter::new(config.filter).apply_with_prices(&combined.direction, fine);
    tracing::debug!(transitions = filtered.transitions.len(), "signals filtered");

    let weights = PositionWeighter::new(config.weights).weights(fine, &filtered.actionable);
    tracing::debug!(max_gross = weights.max_gross(), "weights built");

    Ok(PreparedSchedule {
        alignment_uncovered,
        combined,
        filtered,
        weights,
    })
}

/// Replay a prepared schedule with a fresh executor.
pub fn execute_schedule(
    fine: &MarketPanel,
    weights: &WeightSchedule,
    executor: ExecutorConfig,
    fill_model: FillModelConfig,
) -> Result<BacktestResult, ExecutionError> {
    BacktestExecutor::new(executor)
        .with_fill_model(fill_model.build())
        .run(fine, weights)
}
