//! Fill price models.
//!
//! Trades decided at one bar's close execute at the next bar's open. The
//! default model fills exactly at the open; `SlippageBps` moves the fill
//! against the trader by a fixed number of basis points.

use serde::{Deserialize, Serialize};

use super::cost::TradeSide;
use crate::domain::Bar;

/// Price at which a weight change on `bar` is filled.
pub trait FillPriceModel: Send + Sync {
    fn name(&self) -> &str;

    fn fill_price(&self, bar: &Bar, side: TradeSide) -> f64;
}

/// Fill at the bar's opening price, no slippage.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPrice;

impl FillPriceModel for OpenPrice {
    fn name(&self) -> &str {
        "open_price"
    }

    fn fill_price(&self, bar: &Bar, _side: TradeSide) -> f64 {
        bar.open
    }
}

/// Fill at the open moved adversely by `bps` basis points.
#[derive(Debug, Clone, Copy)]
pub struct SlippageBps {
    pub bps: f64,
}

impl FillPriceModel for SlippageBps {
    fn name(&self) -> &str {
        "slippage_bps"
    }

    fn fill_price(&self, bar: &Bar, side: TradeSide) -> f64 {
        let slip = self.bps / 10_000.0;
        match side {
            TradeSide::Buy => bar.open * (1.0 + slip),
            TradeSide::Sell => bar.open * (1.0 - slip),
        }
    }
}

/// Serializable choice of fill model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillModelConfig {
    #[default]
    OpenPrice,
    SlippageBps {
        bps: f64,
    },
}

impl FillModelConfig {
    pub fn build(&self) -> Box<dyn FillPriceModel> {
        match self {
            FillModelConfig::OpenPrice => Box::new(OpenPrice),
            FillModelConfig::SlippageBps { bps } => Box::new(SlippageBps { bps: *bps }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn open_price_ignores_side() {
        let bar = &make_bars(&[100.0, 105.0])[1];
        assert_eq!(OpenPrice.fill_price(bar, TradeSide::Buy), 100.0);
        assert_eq!(OpenPrice.fill_price(bar, TradeSide::Sell), 100.0);
    }

    #[test]
    fn slippage_is_adverse() {
        let bar = &make_bars(&[100.0, 105.0])[1];
        let model = SlippageBps { bps: 10.0 };
        assert!((model.fill_price(bar, TradeSide::Buy) - 100.1).abs() < 1e-10);
        assert!((model.fill_price(bar, TradeSide::Sell) - 99.9).abs() < 1e-10);
    }

    #[test]
    fn config_is_tagged() {
        let cfg: FillModelConfig =
            serde_json::from_str(r#"{"type":"SLIPPAGE_BPS","bps":5.0}"#).unwrap();
        assert_eq!(cfg, FillModelConfig::SlippageBps { bps: 5.0 });
        assert_eq!(cfg.build().name(), "slippage_bps");
    }
}
