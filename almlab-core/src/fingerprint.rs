//! Deterministic run identity.
//!
//! - `DatasetHash`: content hash of a market panel (timestamps + every bar field).
//! - `ConfigHash`: hash of any serializable configuration's canonical JSON.
//! - `RunId`: config + dataset + seed, hashed together.
//! - `records_digest`: bit-exact digest of a backtest's records, used to check
//!   that two runs on the same inputs are identical.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::MarketPanel;
use crate::engine::BacktestRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic run ID (config + dataset + seed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId {
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub seed: u64,
}

impl RunId {
    pub fn new(config_hash: ConfigHash, dataset_hash: DatasetHash, seed: u64) -> Self {
        Self {
            config_hash,
            dataset_hash,
            seed,
        }
    }

    pub fn hash(&self) -> String {
        let canonical = serde_json::json!({
            "config_hash": &self.config_hash.0,
            "dataset_hash": &self.dataset_hash.0,
            "seed": self.seed,
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.config_hash, self.dataset_hash, self.seed)
    }
}

/// Hash of `config` serialized as JSON. Struct fields serialize in
/// declaration order and maps are BTreeMaps, so the output is stable.
pub fn config_hash<T: Serialize>(config: &T) -> Result<ConfigHash, serde_json::Error> {
    let json = serde_json::to_string(config)?;
    Ok(ConfigHash(blake3::hash(json.as_bytes()).to_hex().to_string()))
}

pub fn dataset_hash(panel: &MarketPanel) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(panel.timeframe().as_str().as_bytes());
    for ts in panel.index() {
        hasher.update(&ts.timestamp_millis().to_le_bytes());
    }
    for (symbol, bars) in panel.iter() {
        hasher.update(symbol.as_bytes());
        hasher.update(&[0]);
        for bar in bars {
            for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
                hasher.update(&canonical_bits(v));
            }
            match bar.funding_rate {
                Some(rate) => {
                    hasher.update(&[1]);
                    hasher.update(&canonical_bits(rate));
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

pub fn records_digest(records: &[BacktestRecord]) -> String {
    let mut hasher = blake3::Hasher::new();
    for r in records {
        hasher.update(&r.timestamp.timestamp_millis().to_le_bytes());
        for v in [r.equity, r.turnover, r.cost, r.gross_exposure] {
            hasher.update(&canonical_bits(v));
        }
    }
    hasher.finalize().to_hex().to_string()
}

// All NaNs hash alike.
fn canonical_bits(v: f64) -> [u8; 8] {
    if v.is_nan() {
        f64::NAN.to_bits().to_le_bytes()
    } else {
        v.to_bits().to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Timeframe};
    use crate::signal::SignalConfig;
    use chrono::{Duration, TimeZone, Utc};

    fn panel(closes: &[f64]) -> MarketPanel {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar {
                symbol: "BTC".into(),
                timestamp: start + Duration::hours(i as i64),
                open: *c,
                high: *c,
                low: *c,
                close: *c,
                volume: 10.0,
                funding_rate: None,
            })
            .collect();
        MarketPanel::from_bars(Timeframe::H1, bars).unwrap()
    }

    #[test]
    fn dataset_hash_is_content_sensitive() {
        let a = dataset_hash(&panel(&[1.0, 2.0, 3.0]));
        let b = dataset_hash(&panel(&[1.0, 2.0, 3.0]));
        let c = dataset_hash(&panel(&[1.0, 2.0, 3.5]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn nan_bars_hash_consistently() {
        let a = dataset_hash(&panel(&[1.0, f64::NAN]));
        let b = dataset_hash(&panel(&[1.0, -f64::NAN]));
        assert_eq!(a, b);
    }

    #[test]
    fn config_hash_tracks_parameters() {
        let base = SignalConfig::default();
        let mut tweaked = SignalConfig::default();
        tweaked.score_threshold = 0.7;
        assert_eq!(config_hash(&base).unwrap(), config_hash(&base).unwrap());
        assert_ne!(config_hash(&base).unwrap(), config_hash(&tweaked).unwrap());
    }

    #[test]
    fn run_id_deterministic() {
        let id = |seed| {
            RunId::new(
                ConfigHash("abc".into()),
                DatasetHash("def".into()),
                seed,
            )
            .hash()
        };
        assert_eq!(id(42), id(42));
        assert_ne!(id(42), id(43));
    }
}
