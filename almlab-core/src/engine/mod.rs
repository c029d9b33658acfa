//! Backtest execution: replay a weight schedule against prices.

pub mod cost;
pub mod executor;
pub mod fill;
pub mod metrics;
pub mod result;

pub use cost::{CostModel, TradeSide};
pub use executor::{BacktestExecutor, ExecutionError, ExecutorConfig, RunState};
pub use fill::{FillModelConfig, FillPriceModel, OpenPrice, SlippageBps};
pub use result::{BacktestRecord, BacktestResult, RunStatus, SummaryStats, SCHEMA_VERSION};
