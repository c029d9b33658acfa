//! Bar interval and its annualization constants.
//!
//! Perpetual swaps trade around the clock, so one year is 365 full days.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Bar interval of a market panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

/// Error parsing a timeframe label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timeframe '{0}' (expected one of M1, M5, M15, M30, H1, H4, D1)")]
pub struct ParseTimeframeError(pub String);

impl std::str::FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "M1" | "1M" => Ok(Timeframe::M1),
            "M5" | "5M" => Ok(Timeframe::M5),
            "M15" | "15M" => Ok(Timeframe::M15),
            "M30" | "30M" => Ok(Timeframe::M30),
            "H1" | "1H" => Ok(Timeframe::H1),
            "H4" | "4H" => Ok(Timeframe::H4),
            "D1" | "1D" => Ok(Timeframe::D1),
            _ => Err(ParseTimeframeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Timeframe {
    pub fn to_seconds(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.to_seconds())
    }

    pub fn bars_per_day(&self) -> f64 {
        86_400.0 / self.to_seconds() as f64
    }

    /// Bars in a 365-day year (8760 for H1).
    pub fn bars_per_year(&self) -> f64 {
        self.bars_per_day() * 365.0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn hourly_annualization() {
        assert_eq!(Timeframe::H1.bars_per_year(), 8_760.0);
        assert_eq!(Timeframe::H4.bars_per_day(), 6.0);
        assert_eq!(Timeframe::D1.bars_per_year(), 365.0);
    }

    #[test]
    fn parses_both_label_styles() {
        assert_eq!(Timeframe::from_str("h1"), Ok(Timeframe::H1));
        assert_eq!(Timeframe::from_str("4H"), Ok(Timeframe::H4));
        assert!(Timeframe::from_str("H2").is_err());
    }

    #[test]
    fn duration_matches_seconds() {
        assert_eq!(Timeframe::H4.duration(), Duration::hours(4));
    }
}
