//! Position weight vectors: signed fraction of capital per symbol.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Symbol;

/// Signed weights for one timestamp. Absent symbols hold zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    weights: BTreeMap<Symbol, f64>,
}

impl WeightVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a map; zero entries are dropped.
    pub fn from_map(mut weights: BTreeMap<Symbol, f64>) -> Self {
        weights.retain(|_, w| *w != 0.0);
        Self { weights }
    }

    pub fn get(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    /// Set a weight; zero removes the entry.
    pub fn set(&mut self, symbol: impl Into<Symbol>, weight: f64) {
        let symbol = symbol.into();
        if weight == 0.0 {
            self.weights.remove(&symbol);
        } else {
            self.weights.insert(symbol, weight);
        }
    }

    /// Sum of absolute weights.
    pub fn gross(&self) -> f64 {
        self.weights.values().map(|w| w.abs()).sum()
    }

    pub fn net(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &f64)> {
        self.weights.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.weights.keys()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Target weights per timestamp, in timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSchedule {
    pub entries: Vec<(DateTime<Utc>, WeightVector)>,
}

impl WeightSchedule {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.entries.iter().map(|(ts, _)| ts)
    }

    pub fn at(&self, position: usize) -> Option<&WeightVector> {
        self.entries.get(position).map(|(_, w)| w)
    }

    /// Largest gross exposure across the schedule.
    pub fn max_gross(&self) -> f64 {
        self.entries
            .iter()
            .map(|(_, w)| w.gross())
            .fold(0.0, f64::max)
    }
}
