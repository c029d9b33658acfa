//! ALM Lab Runner: configuration, data loading and orchestration.
//!
//! This crate builds on `almlab-core` to provide:
//! - TOML run configuration with validation and hashing
//! - CSV panel loading, resampling and a deterministic synthetic fallback
//! - Single-run reports tagged with run, config and dataset hashes
//! - Parallel cost stress sweeps and filter comparisons
//! - JSON and CSV artifact export
//! - Tracing subscriber setup

pub mod config;
pub mod data_loader;
pub mod export;
pub mod logging;
pub mod runner;
pub mod stress;

pub use config::{ConfigError, ExecutionSection, RunConfig, RunSection, StressSection};
pub use data_loader::{
    load_panel_csv, read_panel_csv, resample, synthetic_panel, write_panel_csv, LoadError,
    LoadedPanel, OKX_PERPETUALS,
};
pub use export::{export_json, import_json, save_artifacts};
pub use logging::init_tracing;
pub use runner::{run_backtest, RunError, RunOutput, RunReport, SignalCount};
pub use stress::{compare_filtering, run_cost_stress, FilterComparison, StressRow};
