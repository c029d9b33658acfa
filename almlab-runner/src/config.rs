//! Serializable run configuration, loaded from TOML.
//!
//! Every section is optional; missing keys take the defaults of the
//! corresponding core config.
//!
//! ```toml
//! [run]
//! name = "alm-h1"
//! timeframe = "H1"
//! coarse_timeframe = "H4"
//!
//! [filter]
//! persistence_periods = 4
//!
//! [execution]
//! buy_cost = 0.0005
//! sell_cost = 0.0007
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use almlab_core::domain::Timeframe;
use almlab_core::engine::{CostModel, ExecutorConfig, FillModelConfig};
use almlab_core::filter::FilterConfig;
use almlab_core::fingerprint::{config_hash, ConfigHash};
use almlab_core::pipeline::PipelineConfig;
use almlab_core::signal::SignalConfig;
use almlab_core::weights::WeightConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub name: String,
    pub timeframe: Timeframe,
    /// Timeframe the trend component is computed on; `None` uses `timeframe`.
    pub coarse_timeframe: Option<Timeframe>,
    pub initial_capital: f64,
    /// Master seed for synthetic data.
    pub seed: u64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            name: "alm".into(),
            timeframe: Timeframe::H1,
            coarse_timeframe: None,
            initial_capital: 100_000.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub buy_cost: f64,
    pub sell_cost: f64,
    /// Adverse fill offset from the open; 0 fills exactly at the open.
    pub slippage_bps: f64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            buy_cost: 0.001,
            sell_cost: 0.001,
            slippage_bps: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressSection {
    /// Symmetric cost rates swept by `almlab stress`.
    pub cost_scenarios: Vec<f64>,
}

impl Default for StressSection {
    fn default() -> Self {
        Self {
            cost_scenarios: vec![0.0003, 0.0005, 0.001, 0.0015, 0.002],
        }
    }
}

/// Complete configuration of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run: RunSection,
    pub signal: SignalConfig,
    pub filter: FilterConfig,
    pub weights: WeightConfig,
    pub execution: ExecutionSection,
    pub stress: StressSection,
}

impl RunConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// BLAKE3 of the canonical JSON form. Identical configs hash identically.
    pub fn config_hash(&self) -> Result<ConfigHash, ConfigError> {
        Ok(config_hash(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(self.run.initial_capital.is_finite() && self.run.initial_capital > 0.0) {
            return invalid(format!(
                "run.initial_capital must be positive, got {}",
                self.run.initial_capital
            ));
        }
        if let Some(coarse) = self.run.coarse_timeframe {
            if coarse.to_seconds() <= self.run.timeframe.to_seconds() {
                return invalid(format!(
                    "run.coarse_timeframe {coarse} must be coarser than run.timeframe {}",
                    self.run.timeframe
                ));
            }
        }

        let s = &self.signal;
        let windows = [
            ("signal.ema_windows[0]", s.ema_windows[0]),
            ("signal.ema_windows[1]", s.ema_windows[1]),
            ("signal.ema_windows[2]", s.ema_windows[2]),
            ("signal.donchian_window", s.donchian_window),
            ("signal.atr_window", s.atr_window),
            ("signal.volume_window", s.volume_window),
            ("signal.smoothing_window", s.smoothing_window),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, w)| *w == 0) {
            return invalid(format!("{name} must be at least 1"));
        }
        if !(s.score_threshold > 0.0 && s.score_threshold <= 1.0) {
            return invalid(format!(
                "signal.score_threshold must be in (0, 1], got {}",
                s.score_threshold
            ));
        }
        if s.regime.enabled {
            let r = &s.regime;
            if r.chop_window < 2 || r.adx_window == 0 || r.er_window == 0 {
                return invalid("signal.regime needs chop_window >= 2 and positive adx/er windows".into());
            }
        }
        let ad = &s.adaptive_donchian;
        if ad.enabled && (ad.er_window == 0 || ad.min_window == 0 || ad.min_window > ad.max_window) {
            return invalid(format!(
                "signal.adaptive_donchian needs er_window >= 1 and 1 <= min_window <= max_window, got {}..{}",
                ad.min_window, ad.max_window
            ));
        }
        let w = &s.weights;
        let component_weights = [w.trend, w.breakout, w.volatility, w.volume, w.funding];
        if component_weights.iter().any(|v| !(*v >= 0.0)) {
            return invalid("signal.weights must be non-negative".into());
        }
        if w.total() <= 0.0 {
            return invalid("signal.weights must not all be zero".into());
        }

        let x = &self.filter.exits;
        if x.enabled {
            if x.atr_window == 0 {
                return invalid("filter.exits.atr_window must be at least 1".into());
            }
            let multipliers = [x.stop_loss_atr, x.take_profit_atr, x.trailing_atr];
            if multipliers.iter().flatten().any(|k| !(*k > 0.0)) {
                return invalid("filter.exits ATR multipliers must be positive".into());
            }
        }

        let wc = &self.weights;
        if !(wc.inverse_vol_lookback_days > 0.0) {
            return invalid("weights.inverse_vol_lookback_days must be positive".into());
        }
        if !(wc.max_position > 0.0) || !(wc.max_gross_leverage > 0.0) {
            return invalid("weights.max_position and weights.max_gross_leverage must be positive".into());
        }
        if wc.max_position > wc.max_gross_leverage {
            return invalid(format!(
                "weights.max_position {} exceeds weights.max_gross_leverage {}",
                wc.max_position, wc.max_gross_leverage
            ));
        }
        if wc.rebalance_buffer.is_some_and(|b| !(b >= 0.0)) {
            return invalid("weights.rebalance_buffer must be non-negative".into());
        }
        if let Some(vt) = wc.vol_target {
            if !(vt.target > 0.0 && vt.max_scale > 0.0) || vt.lookback_bars < 2 {
                return invalid("weights.vol_target needs target > 0, max_scale > 0, lookback_bars >= 2".into());
            }
        }

        let e = &self.execution;
        if [e.buy_cost, e.sell_cost, e.slippage_bps].iter().any(|v| !(*v >= 0.0)) {
            return invalid("execution costs and slippage must be non-negative".into());
        }
        if self.stress.cost_scenarios.iter().any(|v| !(*v >= 0.0)) {
            return invalid("stress.cost_scenarios must be non-negative".into());
        }
        Ok(())
    }

    pub fn fill_model(&self) -> FillModelConfig {
        if self.execution.slippage_bps > 0.0 {
            FillModelConfig::SlippageBps {
                bps: self.execution.slippage_bps,
            }
        } else {
            FillModelConfig::OpenPrice
        }
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            signal: self.signal.clone(),
            filter: self.filter,
            weights: self.weights,
            executor: ExecutorConfig {
                initial_capital: self.run.initial_capital,
                cost: CostModel::new(self.execution.buy_cost, self.execution.sell_cost),
            },
            fill_model: self.fill_model(),
        }
    }
}
