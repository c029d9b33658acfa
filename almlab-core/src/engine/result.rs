//! Backtest records and summary statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics;

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// State of the portfolio after one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    /// Σ |Δweight| traded at this bar's open.
    pub turnover: f64,
    /// Transaction cost charged at this bar, in account currency.
    pub cost: f64,
    /// Σ |weight| held after trading.
    pub gross_exposure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Complete,
    /// Replay halted; records stop at the last trustworthy bar.
    Failed { at: DateTime<Utc>, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_return: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub var_95: f64,
    pub annual_turnover: f64,
    pub total_turnover: f64,
    pub total_cost: f64,
    pub rebalance_count: usize,
    pub bar_count: usize,
}

impl SummaryStats {
    pub fn compute(records: &[BacktestRecord], initial_capital: f64, bars_per_year: f64) -> Self {
        let equity: Vec<f64> = records.iter().map(|r| r.equity).collect();
        let turnover: Vec<f64> = records.iter().map(|r| r.turnover).collect();
        let annual_return = metrics::annual_return(initial_capital, &equity, bars_per_year);
        let max_drawdown = metrics::max_drawdown(&equity);
        Self {
            total_return: metrics::total_return(initial_capital, &equity),
            annual_return,
            annual_volatility: metrics::annual_volatility(&equity, bars_per_year),
            sharpe: metrics::sharpe_ratio(&equity, bars_per_year),
            sortino: metrics::sortino_ratio(&equity, bars_per_year),
            calmar: metrics::calmar_ratio(annual_return, max_drawdown),
            max_drawdown,
            var_95: metrics::value_at_risk(&equity, 0.95),
            annual_turnover: metrics::annualized_turnover(&turnover, bars_per_year),
            total_turnover: turnover.iter().sum(),
            total_cost: records.iter().map(|r| r.cost).sum(),
            rebalance_count: turnover.iter().filter(|t| **t > 0.0).count(),
            bar_count: records.len(),
        }
    }
}

/// Complete (or partial) result of one replay. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub status: RunStatus,
    pub initial_capital: f64,
    pub records: Vec<BacktestRecord>,
    pub stats: SummaryStats,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }

    pub fn equity_curve(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.equity).collect()
    }

    pub fn final_equity(&self) -> f64 {
        self.records
            .last()
            .map_or(self.initial_capital, |r| r.equity)
    }
}
