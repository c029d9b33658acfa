//! Market data panel: per-symbol bar series on one shared timestamp index.
//!
//! Missing bars for a symbol are filled with void bars (NaN OHLC). Prices are
//! never forward-filled; downstream stages treat NaN as "no information".

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{Bar, Symbol, Timeframe};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PanelError {
    #[error("panel has no bars")]
    Empty,
    #[error("duplicate bar for '{symbol}' at {timestamp}")]
    Duplicate {
        symbol: Symbol,
        timestamp: DateTime<Utc>,
    },
    #[error("timestamps for '{symbol}' are not strictly increasing at position {position}")]
    NonMonotonic { symbol: Symbol, position: usize },
    #[error("index gap of {actual_secs}s at position {position} (expected {expected_secs}s)")]
    UnevenSpacing {
        position: usize,
        expected_secs: i64,
        actual_secs: i64,
    },
    #[error("series for '{symbol}' has {actual} bars, index has {expected}")]
    LengthMismatch {
        symbol: Symbol,
        expected: usize,
        actual: usize,
    },
    #[error("series for '{symbol}' diverges from the shared index at position {position}")]
    IndexMismatch { symbol: Symbol, position: usize },
    #[error("bar labelled '{found}' stored under symbol '{symbol}'")]
    SymbolMismatch { symbol: Symbol, found: Symbol },
}

/// Timestamp-indexed OHLCV panel for a set of symbols at one timeframe.
#[derive(Debug, Clone)]
pub struct MarketPanel {
    timeframe: Timeframe,
    index: Vec<DateTime<Utc>>,
    series: BTreeMap<Symbol, Vec<Bar>>,
}

impl MarketPanel {
    /// Build a panel from per-symbol series that already share one index.
    pub fn new(
        timeframe: Timeframe,
        series: BTreeMap<Symbol, Vec<Bar>>,
    ) -> Result<Self, PanelError> {
        let first = series.values().next().ok_or(PanelError::Empty)?;
        if first.is_empty() {
            return Err(PanelError::Empty);
        }
        let index: Vec<DateTime<Utc>> = first.iter().map(|b| b.timestamp).collect();

        for (symbol, bars) in &series {
            if bars.len() != index.len() {
                return Err(PanelError::LengthMismatch {
                    symbol: symbol.clone(),
                    expected: index.len(),
                    actual: bars.len(),
                });
            }
            for (position, bar) in bars.iter().enumerate() {
                if bar.symbol != *symbol {
                    return Err(PanelError::SymbolMismatch {
                        symbol: symbol.clone(),
                        found: bar.symbol.clone(),
                    });
                }
                if position > 0 && bar.timestamp <= bars[position - 1].timestamp {
                    return Err(PanelError::NonMonotonic {
                        symbol: symbol.clone(),
                        position,
                    });
                }
                if bar.timestamp != index[position] {
                    return Err(PanelError::IndexMismatch {
                        symbol: symbol.clone(),
                        position,
                    });
                }
            }
        }

        check_spacing(&index, timeframe)?;

        Ok(Self {
            timeframe,
            index,
            series,
        })
    }

    /// Build a panel from long-format bars in any order.
    ///
    /// The shared index is the union of all symbols' timestamps. A symbol
    /// without a bar at some index timestamp gets a void bar there.
    pub fn from_bars(timeframe: Timeframe, bars: Vec<Bar>) -> Result<Self, PanelError> {
        if bars.is_empty() {
            return Err(PanelError::Empty);
        }

        let mut seen: HashSet<(Symbol, DateTime<Utc>)> = HashSet::with_capacity(bars.len());
        let mut grouped: BTreeMap<Symbol, BTreeMap<DateTime<Utc>, Bar>> = BTreeMap::new();
        let mut all_timestamps = BTreeSet::new();

        for bar in bars {
            if !seen.insert((bar.symbol.clone(), bar.timestamp)) {
                return Err(PanelError::Duplicate {
                    symbol: bar.symbol,
                    timestamp: bar.timestamp,
                });
            }
            all_timestamps.insert(bar.timestamp);
            grouped
                .entry(bar.symbol.clone())
                .or_default()
                .insert(bar.timestamp, bar);
        }

        let index: Vec<DateTime<Utc>> = all_timestamps.into_iter().collect();
        check_spacing(&index, timeframe)?;

        let series = grouped
            .into_iter()
            .map(|(symbol, mut by_ts)| {
                let aligned = index
                    .iter()
                    .map(|ts| by_ts.remove(ts).unwrap_or_else(|| void_bar(&symbol, *ts)))
                    .collect();
                (symbol, aligned)
            })
            .collect();

        Ok(Self {
            timeframe,
            index,
            series,
        })
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    /// Symbols in ascending order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.series.keys().cloned().collect()
    }

    pub fn bars(&self, symbol: &str) -> Option<&[Bar]> {
        self.series.get(symbol).map(|v| v.as_slice())
    }

    pub fn closes(&self, symbol: &str) -> Option<Vec<f64>> {
        self.bars(symbol).map(|bars| bars.iter().map(|b| b.close).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Vec<Bar>)> {
        self.series.iter()
    }

    /// Number of bars on the shared index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Fraction of void bars per symbol.
    pub fn void_rates(&self) -> BTreeMap<Symbol, f64> {
        self.series
            .iter()
            .map(|(symbol, bars)| {
                let void = bars.iter().filter(|b| b.is_void()).count();
                (symbol.clone(), void as f64 / bars.len().max(1) as f64)
            })
            .collect()
    }
}

fn check_spacing(index: &[DateTime<Utc>], timeframe: Timeframe) -> Result<(), PanelError> {
    let expected = timeframe.duration();
    for (position, pair) in index.windows(2).enumerate() {
        let gap = pair[1] - pair[0];
        if gap != expected {
            return Err(PanelError::UnevenSpacing {
                position: position + 1,
                expected_secs: expected.num_seconds(),
                actual_secs: gap.num_seconds(),
            });
        }
    }
    Ok(())
}

/// Void bar (all OHLC = NaN) for a timestamp the symbol did not trade.
fn void_bar(symbol: &str, timestamp: DateTime<Utc>) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp,
        open: f64::NAN,
        high: f64::NAN,
        low: f64::NAN,
        close: f64::NAN,
        volume: 0.0,
        funding_rate: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar(symbol: &str, hour: i64, close: f64) -> Bar {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Bar {
            symbol: symbol.into(),
            timestamp: base + Duration::hours(hour),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 100.0,
            funding_rate: None,
        }
    }

    #[test]
    fn from_bars_fills_missing_with_void() {
        let bars = vec![
            bar("BTC", 0, 100.0),
            bar("BTC", 1, 101.0),
            bar("BTC", 2, 102.0),
            bar("ETH", 0, 50.0),
            bar("ETH", 2, 52.0),
        ];
        let panel = MarketPanel::from_bars(Timeframe::H1, bars).unwrap();
        assert_eq!(panel.len(), 3);
        let eth = panel.bars("ETH").unwrap();
        assert!(eth[1].is_void());
        assert_eq!(eth[2].close, 52.0);
        assert!((panel.void_rates()["ETH"] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn from_bars_sorts_input() {
        let bars = vec![bar("BTC", 2, 102.0), bar("BTC", 0, 100.0), bar("BTC", 1, 101.0)];
        let panel = MarketPanel::from_bars(Timeframe::H1, bars).unwrap();
        assert_eq!(panel.closes("BTC").unwrap(), vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn rejects_duplicates() {
        let bars = vec![bar("BTC", 0, 100.0), bar("BTC", 0, 100.5)];
        let err = MarketPanel::from_bars(Timeframe::H1, bars).unwrap_err();
        assert!(matches!(err, PanelError::Duplicate { .. }));
    }

    #[test]
    fn rejects_uneven_spacing() {
        let bars = vec![bar("BTC", 0, 100.0), bar("BTC", 1, 101.0), bar("BTC", 3, 103.0)];
        let err = MarketPanel::from_bars(Timeframe::H1, bars).unwrap_err();
        assert_eq!(
            err,
            PanelError::UnevenSpacing {
                position: 2,
                expected_secs: 3600,
                actual_secs: 7200
            }
        );
    }

    #[test]
    fn new_rejects_non_monotonic_series() {
        let mut series = BTreeMap::new();
        series.insert("BTC".to_string(), vec![bar("BTC", 1, 101.0), bar("BTC", 0, 100.0)]);
        let err = MarketPanel::new(Timeframe::H1, series).unwrap_err();
        assert!(matches!(err, PanelError::NonMonotonic { position: 1, .. }));
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let mut series = BTreeMap::new();
        series.insert("BTC".to_string(), vec![bar("BTC", 0, 100.0), bar("BTC", 1, 101.0)]);
        series.insert("ETH".to_string(), vec![bar("ETH", 0, 50.0)]);
        let err = MarketPanel::new(Timeframe::H1, series).unwrap_err();
        assert!(matches!(err, PanelError::LengthMismatch { .. }));
    }

    #[test]
    fn empty_panel_is_an_error() {
        assert_eq!(
            MarketPanel::from_bars(Timeframe::H1, vec![]).unwrap_err(),
            PanelError::Empty
        );
    }
}
