//! Position weighting: inverse volatility, optional volatility targeting,
//! exposure caps and a rebalance buffer.

pub mod config;
pub mod sizing;
pub mod weighter;

pub use config::{VolTargetConfig, WeightConfig};
pub use sizing::{
    apply_caps, apply_rebalance_buffer, inverse_volatility_weights, vol_target_scale,
    ActiveAsset,
};
pub use weighter::PositionWeighter;
