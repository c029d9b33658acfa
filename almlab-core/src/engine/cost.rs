//! Cost model: proportional transaction costs with separate buy and sell rates.
//!
//! Cost is charged on traded notional: |Δweight| × rate × equity. It does not
//! depend on the fill price, only on how much capital changes hands.

use serde::{Deserialize, Serialize};

/// Direction of a weight change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Side of a weight delta; `None` for no trade.
    pub fn of_delta(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(TradeSide::Buy)
        } else if delta < 0.0 {
            Some(TradeSide::Sell)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Fraction of traded notional charged on buys.
    pub buy_rate: f64,
    /// Fraction of traded notional charged on sells.
    pub sell_rate: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::symmetric(0.001)
    }
}

impl CostModel {
    pub fn new(buy_rate: f64, sell_rate: f64) -> Self {
        Self {
            buy_rate,
            sell_rate,
        }
    }

    pub fn symmetric(rate: f64) -> Self {
        Self::new(rate, rate)
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn rate(&self, side: TradeSide) -> f64 {
        match side {
            TradeSide::Buy => self.buy_rate,
            TradeSide::Sell => self.sell_rate,
        }
    }

    /// Cost of moving a weight by `delta` on capital `equity`.
    pub fn trade_cost(&self, delta: f64, equity: f64) -> f64 {
        match TradeSide::of_delta(delta) {
            Some(side) => delta.abs() * self.rate(side) * equity,
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_costs_nothing() {
        assert_eq!(CostModel::frictionless().trade_cost(0.5, 100_000.0), 0.0);
    }

    #[test]
    fn cost_is_proportional_to_delta() {
        let cost = CostModel::default();
        // 0.2 * 0.001 * 100k = 20
        assert!((cost.trade_cost(0.2, 100_000.0) - 20.0).abs() < 1e-10);
        assert!((cost.trade_cost(-0.2, 100_000.0) - 20.0).abs() < 1e-10);
    }

    #[test]
    fn asymmetric_rates() {
        let cost = CostModel::new(0.0005, 0.0015);
        assert!((cost.trade_cost(0.1, 1_000.0) - 0.05).abs() < 1e-10);
        assert!((cost.trade_cost(-0.1, 1_000.0) - 0.15).abs() < 1e-10);
    }

    #[test]
    fn zero_delta_is_free() {
        assert_eq!(CostModel::default().trade_cost(0.0, 1e6), 0.0);
        assert_eq!(TradeSide::of_delta(0.0), None);
    }
}
