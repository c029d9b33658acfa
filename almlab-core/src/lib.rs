//! ALM Lab Core: signal-to-position pipeline for crypto perpetual backtests.
//!
//! This crate contains the pure, I/O-free part of the system:
//! - Domain types (bars, market panels, signal matrices, weight schedules)
//! - Indicators (EMA, Donchian, ATR, rolling statistics)
//! - Cross-timeframe alignment with no lookahead
//! - Five-component signal scoring
//! - Stateful turnover filter (persistence, minimum hold, cooldown)
//! - Inverse-volatility weighting with vol targeting, caps and rebalance buffer
//! - Sequential backtest executor with cost accounting and metrics

pub mod align;
pub mod domain;
pub mod engine;
pub mod filter;
pub mod fingerprint;
pub mod indicators;
pub mod pipeline;
pub mod signal;
pub mod weights;
