//! Panel loading for the runner.
//!
//! Two sources:
//! 1. A long-format CSV (`timestamp,symbol,open,high,low,close,volume[,funding_rate]`)
//! 2. A deterministic synthetic panel (developer debug mode)
//!
//! Missing bars become void bars (all prices NaN); prices are never
//! forward-filled. Results produced on synthetic data are tagged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use almlab_core::domain::{Bar, MarketPanel, PanelError, Timeframe};
use almlab_core::fingerprint::{dataset_hash, DatasetHash};

/// Liquid OKX USDT-margined perpetuals, most liquid first.
pub const OKX_PERPETUALS: &[&str] = &[
    "BTC-USDT-SWAP",
    "ETH-USDT-SWAP",
    "SOL-USDT-SWAP",
    "XRP-USDT-SWAP",
    "BNB-USDT-SWAP",
    "ZEC-USDT-SWAP",
    "DOGE-USDT-SWAP",
    "LINK-USDT-SWAP",
    "ADA-USDT-SWAP",
    "AVAX-USDT-SWAP",
    "LTC-USDT-SWAP",
    "UNI-USDT-SWAP",
    "AAVE-USDT-SWAP",
    "SHIB-USDT-SWAP",
    "HBAR-USDT-SWAP",
];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unparseable timestamp '{value}' (expected RFC 3339 or epoch milliseconds)")]
    Timestamp { row: usize, value: String },
    #[error("invalid panel: {0}")]
    Panel(#[from] PanelError),
}

/// A loaded panel plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedPanel {
    pub panel: MarketPanel,
    pub dataset_hash: DatasetHash,
    pub has_synthetic: bool,
    /// Data quality notes (void bars per symbol).
    pub warnings: Vec<String>,
}

impl LoadedPanel {
    fn new(panel: MarketPanel, has_synthetic: bool) -> Self {
        let warnings = panel
            .void_rates()
            .into_iter()
            .filter(|(_, rate)| *rate > 0.0)
            .map(|(symbol, rate)| format!("{symbol}: {:.2}% void bars", rate * 100.0))
            .collect::<Vec<_>>();
        for w in &warnings {
            tracing::warn!(warning = %w, "data quality");
        }
        Self {
            dataset_hash: dataset_hash(&panel),
            panel,
            has_synthetic,
            warnings,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    timestamp: String,
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    funding_rate: Option<f64>,
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Read a long-format CSV from any reader.
pub fn read_panel_csv<R: std::io::Read>(
    reader: R,
    timeframe: Timeframe,
) -> Result<LoadedPanel, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        bars.push(Bar {
            symbol: row.symbol,
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            funding_rate: row.funding_rate,
        });
    }
    let panel = MarketPanel::from_bars(timeframe, bars)?;
    tracing::info!(
        symbols = panel.symbols().len(),
        bars = panel.len(),
        %timeframe,
        "panel loaded"
    );
    Ok(LoadedPanel::new(panel, false))
}

pub fn load_panel_csv(path: &Path, timeframe: Timeframe) -> Result<LoadedPanel, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_panel_csv(std::io::BufReader::new(file), timeframe)
}

/// Write a panel in the format `load_panel_csv` reads. Void bars are omitted.
pub fn write_panel_csv<W: std::io::Write>(panel: &MarketPanel, writer: W) -> Result<(), LoadError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (i, ts) in panel.index().iter().enumerate() {
        for (_, bars) in panel.iter() {
            let bar = &bars[i];
            if bar.is_void() {
                continue;
            }
            wtr.serialize(CsvRow {
                timestamp: ts.to_rfc3339(),
                symbol: bar.symbol.clone(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                funding_rate: bar.funding_rate,
            })?;
        }
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

// ─── Synthetic data ─────────────────────────────────────────────────

/// Funding settles every 8 hours on OKX perpetuals.
const FUNDING_INTERVAL_SECS: i64 = 8 * 3600;

/// Deterministic per-symbol seed, independent of symbol order.
fn sub_seed(master_seed: u64, symbol: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&master_seed.to_le_bytes());
    hasher.update(symbol.as_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Standard normal draw (Box-Muller).
fn normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Regime-switching random walk for one symbol.
///
/// Drift flips sign at random, so the series alternates between trending and
/// choppy stretches. Funding leans with the prevailing drift.
fn synthetic_bars(
    symbol: &str,
    timeframe: Timeframe,
    n: usize,
    start: DateTime<Utc>,
    seed: u64,
) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(sub_seed(seed, symbol));
    let bar_hours = timeframe.to_seconds() as f64 / 3600.0;
    let sigma = rng.gen_range(0.006..0.014) * bar_hours.sqrt();
    let base_volume = rng.gen_range(1_000.0..50_000.0);
    let mut drift = 0.0;
    let mut price = rng.gen_range(1.0..1_000.0_f64);
    let step = timeframe.duration();

    (0..n)
        .map(|i| {
            if rng.gen_bool(0.01) || i == 0 {
                drift = rng.gen_range(-0.6..0.6) * sigma;
            }
            let timestamp = start + step * i as i32;
            let open = price;
            let close = (open * (1.0 + drift + sigma * normal(&mut rng))).max(1e-8);
            let wick = sigma * rng.gen::<f64>() * 0.5;
            let high = open.max(close) * (1.0 + wick);
            let low = open.min(close) * (1.0 - wick);
            let spike = if rng.gen_bool(0.05) { 3.0 } else { 1.0 };
            let volume = base_volume * spike * (0.5 + rng.gen::<f64>());
            let funding_rate = (timestamp.timestamp() % FUNDING_INTERVAL_SECS == 0).then(|| {
                let lean = if drift > 0.0 { 1.0 } else { -1.0 };
                (0.0001 + lean * 0.0004 + 0.0004 * normal(&mut rng)).clamp(-0.0075, 0.0075)
            });
            price = close;
            Bar {
                symbol: symbol.to_string(),
                timestamp,
                open,
                high,
                low,
                close,
                volume,
                funding_rate,
            }
        })
        .collect()
}

/// Deterministic synthetic panel. Same seed, same panel.
pub fn synthetic_panel(
    symbols: &[String],
    timeframe: Timeframe,
    bars: usize,
    start: DateTime<Utc>,
    seed: u64,
) -> Result<LoadedPanel, LoadError> {
    tracing::warn!(
        symbols = symbols.len(),
        bars,
        "generating synthetic data; results will be tagged as synthetic"
    );
    let series: BTreeMap<String, Vec<Bar>> = symbols
        .iter()
        .map(|s| (s.clone(), synthetic_bars(s, timeframe, bars, start, seed)))
        .collect();
    let panel = MarketPanel::new(timeframe, series)?;
    Ok(LoadedPanel::new(panel, true))
}

/// Resample a panel to a coarser timeframe.
///
/// Buckets are aligned to multiples of the coarse interval since the epoch
/// and labelled by their open. A bucket takes the first valid open, max high,
/// min low, last valid close, summed volume and last reported funding. Empty
/// buckets are void.
pub fn resample(panel: &MarketPanel, coarse: Timeframe) -> Result<MarketPanel, LoadError> {
    let secs = coarse.to_seconds();
    let mut out = Vec::new();
    for (symbol, bars) in panel.iter() {
        let mut buckets: BTreeMap<i64, Vec<&Bar>> = BTreeMap::new();
        for bar in bars {
            let key = bar.timestamp.timestamp().div_euclid(secs) * secs;
            buckets.entry(key).or_default().push(bar);
        }
        for (key, members) in buckets {
            let Some(timestamp) = DateTime::<Utc>::from_timestamp(key, 0) else {
                continue;
            };
            let valid: Vec<&&Bar> = members.iter().filter(|b| !b.is_void()).collect();
            let bar = match (valid.first(), valid.last()) {
                (Some(first), Some(last)) => Bar {
                    symbol: symbol.clone(),
                    timestamp,
                    open: first.open,
                    high: valid.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
                    low: valid.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
                    close: last.close,
                    volume: valid.iter().map(|b| b.volume).sum(),
                    funding_rate: members.iter().rev().find_map(|b| b.funding_rate),
                },
                _ => Bar {
                    symbol: symbol.clone(),
                    timestamp,
                    open: f64::NAN,
                    high: f64::NAN,
                    low: f64::NAN,
                    close: f64::NAN,
                    volume: 0.0,
                    funding_rate: None,
                },
            };
            out.push(bar);
        }
    }
    Ok(MarketPanel::from_bars(coarse, out)?)
}
