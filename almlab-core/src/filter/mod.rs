//! Stateful turnover control: persistence, minimum holding and cooldown,
//! plus optional ATR stop-loss, take-profit and trailing exits.
//!
//! Each asset runs its own FLAT/LONG/SHORT state machine over its bars in
//! timestamp order. Assets are independent and are filtered in parallel.

pub mod arena;
pub mod state;

pub use arena::{FilterArena, FilterOutput, StatefulSignalFilter, Transition};
pub use state::{ExitConfig, ExitReason, FilterConfig, FilterState, PositionState, PriceContext};
