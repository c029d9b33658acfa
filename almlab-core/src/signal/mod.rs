//! Signal combination: per-asset component signals folded into one weighted
//! score and a thresholded directional signal.

pub mod combiner;
pub mod components;
pub mod config;

pub use combiner::{CombinedSignals, SignalCombiner};
pub use components::{
    breakout_component, funding_component, trend_component, volatility_component,
    volume_component, Component, ComponentFrame,
};
pub use config::{ComponentWeights, SignalConfig};
