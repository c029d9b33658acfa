//! Backtest runner: wires configuration, loaded data and the core pipeline.
//!
//! Entry points:
//! - `run_backtest()`: one full pipeline run, summarized as a `RunReport`.
//! - `resolve_coarse()`: picks the coarse panel for the trend component
//!   (explicit panel, else resampled from the fine panel, else none).

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use almlab_core::domain::{MarketPanel, Symbol, Timeframe, WeightSchedule};
use almlab_core::engine::{BacktestResult, SCHEMA_VERSION};
use almlab_core::filter::Transition;
use almlab_core::fingerprint::{records_digest, ConfigHash, DatasetHash, RunId};
use almlab_core::pipeline::{run_pipeline, PipelineError};

use crate::config::{ConfigError, RunConfig};
use crate::data_loader::{resample, LoadError, LoadedPanel};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl RunError {
    /// Partial result when the executor halted mid-run.
    pub fn partial(&self) -> Option<&BacktestResult> {
        match self {
            RunError::Pipeline(PipelineError::Execution(e)) => e.partial(),
            _ => None,
        }
    }
}

/// Non-zero bars per symbol before and after the stateful filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalCount {
    pub raw: usize,
    pub filtered: usize,
}

/// Complete summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    pub run_id: String,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    /// BLAKE3 over the result records; equal for identical inputs.
    pub records_digest: String,
    pub has_synthetic: bool,
    pub timeframe: Timeframe,
    pub coarse_timeframe: Option<Timeframe>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub signal_counts: BTreeMap<Symbol, SignalCount>,
    pub transitions: usize,
    pub alignment_uncovered: Option<usize>,
    pub warnings: Vec<String>,
    pub result: BacktestResult,
}

/// Default schema version for JSON written before the field existed.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Report plus the artifacts too large to embed in it.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub report: RunReport,
    pub weights: WeightSchedule,
    pub transitions: Vec<Transition>,
}

/// Coarse panel for the trend component.
///
/// An explicitly supplied panel wins. Otherwise, when the config names a
/// coarse timeframe, the fine panel is resampled to it.
pub fn resolve_coarse<'a>(
    config: &RunConfig,
    fine: &MarketPanel,
    coarse: Option<&'a MarketPanel>,
) -> Result<Option<Cow<'a, MarketPanel>>, RunError> {
    match (coarse, config.run.coarse_timeframe) {
        (Some(panel), Some(expected)) if panel.timeframe() != expected => {
            Err(ConfigError::Invalid(format!(
                "coarse panel is {} but run.coarse_timeframe is {expected}",
                panel.timeframe()
            ))
            .into())
        }
        (Some(panel), _) => Ok(Some(Cow::Borrowed(panel))),
        (None, Some(tf)) => {
            tracing::info!(from = %fine.timeframe(), to = %tf, "resampling fine panel for trend");
            Ok(Some(Cow::Owned(resample(fine, tf)?)))
        }
        (None, None) => Ok(None),
    }
}

pub(crate) fn check_timeframe(config: &RunConfig, fine: &MarketPanel) -> Result<(), RunError> {
    if fine.timeframe() != config.run.timeframe {
        return Err(ConfigError::Invalid(format!(
            "panel timeframe {} does not match run.timeframe {}",
            fine.timeframe(),
            config.run.timeframe
        ))
        .into());
    }
    Ok(())
}

/// Run the full pipeline once.
pub fn run_backtest(
    config: &RunConfig,
    fine: &LoadedPanel,
    coarse: Option<&MarketPanel>,
) -> Result<RunOutput, RunError> {
    config.validate()?;
    check_timeframe(config, &fine.panel)?;
    let coarse = resolve_coarse(config, &fine.panel, coarse)?;

    let config_hash = config.config_hash()?;
    let run_id = RunId::new(
        config_hash.clone(),
        fine.dataset_hash.clone(),
        config.run.seed,
    )
    .hash();

    tracing::info!(
        name = %config.run.name,
        run_id = %run_id.get(..12).unwrap_or(&run_id),
        symbols = fine.panel.symbols().len(),
        bars = fine.panel.len(),
        synthetic = fine.has_synthetic,
        "backtest starting"
    );

    let out = run_pipeline(&fine.panel, coarse.as_deref(), &config.to_pipeline_config())?;

    let signal_counts = fine
        .panel
        .symbols()
        .into_iter()
        .map(|symbol| {
            let count = SignalCount {
                raw: out.combined.direction.count_nonzero(&symbol),
                filtered: out.filtered.actionable.count_nonzero(&symbol),
            };
            (symbol, count)
        })
        .collect();

    let mut warnings = fine.warnings.clone();
    if let Some(uncovered) = out.alignment_uncovered.filter(|u| *u > 0) {
        warnings.push(format!(
            "{uncovered} leading bars had no closed coarse bar and were held neutral"
        ));
    }

    let report = RunReport {
        schema_version: SCHEMA_VERSION,
        name: config.run.name.clone(),
        run_id,
        config_hash,
        dataset_hash: fine.dataset_hash.clone(),
        records_digest: records_digest(&out.result.records),
        has_synthetic: fine.has_synthetic,
        timeframe: fine.panel.timeframe(),
        coarse_timeframe: coarse.as_ref().map(|c| c.timeframe()),
        start: fine.panel.index().first().copied(),
        end: fine.panel.index().last().copied(),
        signal_counts,
        transitions: out.filtered.transitions.len(),
        alignment_uncovered: out.alignment_uncovered,
        warnings,
        result: out.result,
    };

    tracing::info!(
        total_return = report.result.stats.total_return,
        sharpe = report.result.stats.sharpe,
        max_drawdown = report.result.stats.max_drawdown,
        annual_turnover = report.result.stats.annual_turnover,
        transitions = report.transitions,
        "backtest finished"
    );

    Ok(RunOutput {
        report,
        weights: out.weights,
        transitions: out.filtered.transitions,
    })
}
