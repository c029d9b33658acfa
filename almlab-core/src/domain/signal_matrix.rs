//! Dense (timestamp × symbol) matrix of real-valued signals.
//!
//! Each pipeline stage returns a fresh matrix; nothing downstream mutates a
//! matrix it was handed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{PanelError, Symbol};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMatrix {
    index: Vec<DateTime<Utc>>,
    columns: BTreeMap<Symbol, Vec<f64>>,
}

impl SignalMatrix {
    /// Build a matrix from per-symbol columns; every column must match the index length.
    pub fn from_columns(
        index: Vec<DateTime<Utc>>,
        columns: BTreeMap<Symbol, Vec<f64>>,
    ) -> Result<Self, PanelError> {
        for (symbol, column) in &columns {
            if column.len() != index.len() {
                return Err(PanelError::LengthMismatch {
                    symbol: symbol.clone(),
                    expected: index.len(),
                    actual: column.len(),
                });
            }
        }
        Ok(Self { index, columns })
    }

    /// Columns already known to match the index length.
    pub(crate) fn from_parts(index: Vec<DateTime<Utc>>, columns: BTreeMap<Symbol, Vec<f64>>) -> Self {
        debug_assert!(columns.values().all(|c| c.len() == index.len()));
        Self { index, columns }
    }

    /// Matrix with every cell set to `value`.
    pub fn filled(index: Vec<DateTime<Utc>>, symbols: &[Symbol], value: f64) -> Self {
        let n = index.len();
        let columns = symbols.iter().map(|s| (s.clone(), vec![value; n])).collect();
        Self { index, columns }
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.columns.keys().cloned().collect()
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.columns.get(symbol).map(|c| c.as_slice())
    }

    pub fn get(&self, position: usize, symbol: &str) -> Option<f64> {
        self.columns.get(symbol).and_then(|c| c.get(position).copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Vec<f64>)> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// New matrix with each column transformed independently (in parallel).
    ///
    /// The closure must return a column of the same length.
    pub fn map_columns<F>(&self, f: F) -> Self
    where
        F: Fn(&Symbol, &[f64]) -> Vec<f64> + Sync,
    {
        let columns = self
            .columns
            .par_iter()
            .map(|(symbol, column)| (symbol.clone(), f(symbol, column)))
            .collect();
        Self {
            index: self.index.clone(),
            columns,
        }
    }

    /// Number of non-zero, non-NaN cells in a column.
    pub fn count_nonzero(&self, symbol: &str) -> usize {
        self.column(symbol)
            .map(|c| c.iter().filter(|v| !v.is_nan() && **v != 0.0).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn index(n: usize) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| base + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn from_columns_checks_lengths() {
        let mut columns = BTreeMap::new();
        columns.insert("BTC".to_string(), vec![1.0, 0.0]);
        assert!(SignalMatrix::from_columns(index(3), columns).is_err());
    }

    #[test]
    fn map_columns_leaves_source_untouched() {
        let m = SignalMatrix::filled(index(4), &["BTC".to_string()], 1.0);
        let doubled = m.map_columns(|_, c| c.iter().map(|v| v * 2.0).collect());
        assert_eq!(m.get(0, "BTC"), Some(1.0));
        assert_eq!(doubled.get(3, "BTC"), Some(2.0));
    }

    #[test]
    fn count_nonzero_ignores_nan() {
        let mut columns = BTreeMap::new();
        columns.insert("BTC".to_string(), vec![1.0, 0.0, f64::NAN, -1.0]);
        let m = SignalMatrix::from_columns(index(4), columns).unwrap();
        assert_eq!(m.count_nonzero("BTC"), 2);
        assert_eq!(m.count_nonzero("ETH"), 0);
    }
}
