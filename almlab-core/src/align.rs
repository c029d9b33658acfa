//! Cross-timeframe alignment: broadcast a coarse signal onto a fine index.
//!
//! Each fine timestamp receives the value of the latest coarse bar that has
//! *closed* at or before it. Nothing is ever looked up speculatively: a
//! malformed index is an `AlignmentError`, and fine bars that precede every
//! coarse bar are neutral (0.0) and counted in `Alignment::uncovered`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::domain::{SignalMatrix, Symbol};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("fine index is empty")]
    EmptyFineIndex,
    #[error("fine index is not strictly increasing at position {position}")]
    FineIndexNotMonotonic { position: usize },
    #[error("coarse index is not strictly increasing at position {position}")]
    CoarseIndexNotMonotonic { position: usize },
}

/// How coarse timestamps are labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarLabel {
    /// Timestamp is the bar's close: the value is usable at that instant.
    Close,
    /// Timestamp is the bar's open: the value is usable `interval` later.
    Open { interval: Duration },
}

impl BarLabel {
    fn availability_offset(&self) -> Duration {
        match self {
            BarLabel::Close => Duration::zero(),
            BarLabel::Open { interval } => *interval,
        }
    }
}

/// Result of an alignment.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Signal on the fine index.
    pub matrix: SignalMatrix,
    /// Leading fine bars with no covering coarse bar (set to 0.0).
    pub uncovered: usize,
}

impl Alignment {
    pub fn is_fully_covered(&self) -> bool {
        self.uncovered == 0
    }
}

/// Forward-fills coarse bars across the fine bars they cover.
#[derive(Debug, Clone, Copy)]
pub struct TimeframeAligner {
    label: BarLabel,
}

impl TimeframeAligner {
    pub fn new(label: BarLabel) -> Self {
        Self { label }
    }

    pub fn align(
        &self,
        coarse: &SignalMatrix,
        fine_index: &[DateTime<Utc>],
    ) -> Result<Alignment, AlignmentError> {
        if fine_index.is_empty() {
            return Err(AlignmentError::EmptyFineIndex);
        }
        if let Some(position) = first_non_increasing(fine_index) {
            return Err(AlignmentError::FineIndexNotMonotonic { position });
        }
        if let Some(position) = first_non_increasing(coarse.index()) {
            return Err(AlignmentError::CoarseIndexNotMonotonic { position });
        }

        let offset = self.label.availability_offset();
        let available: Vec<DateTime<Utc>> = coarse.index().iter().map(|t| *t + offset).collect();

        // source[i] = coarse position feeding fine bar i, if any.
        let mut source: Vec<Option<usize>> = Vec::with_capacity(fine_index.len());
        let mut next = 0usize;
        for t in fine_index {
            while next < available.len() && available[next] <= *t {
                next += 1;
            }
            source.push(next.checked_sub(1));
        }

        let uncovered = source.iter().take_while(|s| s.is_none()).count();
        if uncovered > 0 {
            tracing::warn!(
                uncovered,
                first_fine = %fine_index[0],
                "fine bars precede every closed coarse bar; set to neutral"
            );
        }

        let columns: BTreeMap<Symbol, Vec<f64>> = coarse
            .iter()
            .map(|(symbol, values)| {
                let fine = source
                    .iter()
                    .map(|s| s.map_or(0.0, |j| values[j]))
                    .collect();
                (symbol.clone(), fine)
            })
            .collect();

        Ok(Alignment {
            matrix: SignalMatrix::from_parts(fine_index.to_vec(), columns),
            uncovered,
        })
    }
}

fn first_non_increasing(index: &[DateTime<Utc>]) -> Option<usize> {
    index
        .windows(2)
        .position(|w| w[1] <= w[0])
        .map(|p| p + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hours(base_hour: i64, n: usize, step: i64) -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| base + Duration::hours(base_hour + i as i64 * step))
            .collect()
    }

    fn coarse(values: Vec<f64>, base_hour: i64) -> SignalMatrix {
        let mut cols = BTreeMap::new();
        let n = values.len();
        cols.insert("BTC".to_string(), values);
        SignalMatrix::from_columns(hours(base_hour, n, 4), cols).unwrap()
    }

    #[test]
    fn close_label_forward_fills() {
        // Coarse bars close at 0h, 4h, 8h.
        let c = coarse(vec![1.0, 2.0, 3.0], 0);
        let fine = hours(0, 10, 1);
        let out = TimeframeAligner::new(BarLabel::Close).align(&c, &fine).unwrap();
        let col = out.matrix.column("BTC").unwrap();
        assert_eq!(col, &[1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0]);
        assert!(out.is_fully_covered());
    }

    #[test]
    fn open_label_waits_for_bar_close() {
        // Coarse bar opened at 0h closes at 4h: fine bars 0..=3 see nothing.
        let c = coarse(vec![1.0, 2.0], 0);
        let fine = hours(0, 9, 1);
        let out = TimeframeAligner::new(BarLabel::Open {
            interval: Duration::hours(4),
        })
        .align(&c, &fine)
        .unwrap();
        let col = out.matrix.column("BTC").unwrap();
        assert_eq!(col, &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0]);
        assert_eq!(out.uncovered, 4);
    }

    #[test]
    fn rejects_non_monotonic_fine_index() {
        let c = coarse(vec![1.0], 0);
        let mut fine = hours(0, 3, 1);
        fine.swap(1, 2);
        let err = TimeframeAligner::new(BarLabel::Close).align(&c, &fine).unwrap_err();
        assert_eq!(err, AlignmentError::FineIndexNotMonotonic { position: 1 });
    }

    #[test]
    fn rejects_duplicate_fine_timestamps() {
        let c = coarse(vec![1.0], 0);
        let mut fine = hours(0, 3, 1);
        fine[2] = fine[1];
        let err = TimeframeAligner::new(BarLabel::Close).align(&c, &fine).unwrap_err();
        assert_eq!(err, AlignmentError::FineIndexNotMonotonic { position: 2 });
    }

    #[test]
    fn empty_fine_index_is_an_error() {
        let c = coarse(vec![1.0], 0);
        let err = TimeframeAligner::new(BarLabel::Close).align(&c, &[]).unwrap_err();
        assert_eq!(err, AlignmentError::EmptyFineIndex);
    }
}
