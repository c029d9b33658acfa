//! Pure sizing functions used by the weighter.

use crate::domain::{Symbol, WeightVector};

/// A non-flat asset eligible for a weight at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAsset {
    pub symbol: Symbol,
    /// +1 long, -1 short.
    pub direction: f64,
    /// Annualized realized volatility.
    pub volatility: f64,
}

/// Weights proportional to 1 / (volatility + epsilon), normalized so their
/// cross-sectional mean is 1, then signed by direction.
pub fn inverse_volatility_weights(active: &[ActiveAsset], epsilon: f64) -> WeightVector {
    let mut weights = WeightVector::new();
    if active.is_empty() {
        return weights;
    }
    let raw: Vec<f64> = active
        .iter()
        .map(|a| 1.0 / (a.volatility.max(0.0) + epsilon))
        .collect();
    let mean = raw.iter().sum::<f64>() / raw.len() as f64;
    for (asset, r) in active.iter().zip(&raw) {
        weights.set(asset.symbol.clone(), asset.direction.signum() * r / mean);
    }
    weights
}

/// Multiplier that brings `portfolio_vol` to `target`, capped at `max_scale`.
///
/// An unknown portfolio volatility leaves the weights unscaled.
pub fn vol_target_scale(portfolio_vol: f64, target: f64, max_scale: f64, epsilon: f64) -> f64 {
    if portfolio_vol.is_nan() {
        return 1.0;
    }
    (target / (portfolio_vol + epsilon)).min(max_scale)
}

/// Clip each weight to ±`max_position`, then scale the vector down
/// proportionally if gross exposure exceeds `max_gross`.
pub fn apply_caps(weights: &WeightVector, max_position: f64, max_gross: f64) -> WeightVector {
    let mut clipped = WeightVector::new();
    for (symbol, w) in weights.iter() {
        clipped.set(symbol.clone(), w.clamp(-max_position, max_position));
    }
    let gross = clipped.gross();
    if gross <= max_gross {
        return clipped;
    }
    let scale = max_gross / gross;
    let mut scaled = WeightVector::new();
    for (symbol, w) in clipped.iter() {
        scaled.set(symbol.clone(), w * scale);
    }
    scaled
}

/// Keep each previous weight when it lies within `buffer_pct` of the proposed
/// one: |previous - proposed| <= buffer_pct * |proposed|.
pub fn apply_rebalance_buffer(
    previous: &WeightVector,
    proposed: &WeightVector,
    buffer_pct: f64,
) -> WeightVector {
    let mut out = WeightVector::new();
    for symbol in previous.symbols().chain(proposed.symbols()) {
        let prev = previous.get(symbol);
        let next = proposed.get(symbol);
        let kept = if (prev - next).abs() <= buffer_pct * next.abs() {
            prev
        } else {
            next
        };
        out.set(symbol.clone(), kept);
    }
    out
}
