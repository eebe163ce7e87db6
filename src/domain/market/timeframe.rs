use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Intraday bar intervals supported by the market-data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    SixtyMin,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::ThirtyMin => 30,
            Timeframe::SixtyMin => 60,
        }
    }

    /// Converts to the Alpha Vantage `interval` parameter
    pub fn to_alpha_vantage_string(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1min",
            Timeframe::FiveMin => "5min",
            Timeframe::FifteenMin => "15min",
            Timeframe::ThirtyMin => "30min",
            Timeframe::SixtyMin => "60min",
        }
    }

    /// Whether the fixed horizon labels ("15min", "30min", "60min") describe
    /// this interval truthfully. They are computed for 5-minute bars.
    pub fn matches_horizon_labels(&self) -> bool {
        *self == Timeframe::FiveMin
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" => Ok(Timeframe::OneMin),
            "5m" | "5min" => Ok(Timeframe::FiveMin),
            "15m" | "15min" => Ok(Timeframe::FifteenMin),
            "30m" | "30min" => Ok(Timeframe::ThirtyMin),
            "60m" | "60min" | "1h" => Ok(Timeframe::SixtyMin),
            _ => Err(anyhow!(
                "Invalid interval: '{}'. Valid options: 1min, 5min, 15min, 30min, 60min",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_alpha_vantage_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minutes() {
        assert_eq!(Timeframe::OneMin.to_minutes(), 1);
        assert_eq!(Timeframe::FiveMin.to_minutes(), 5);
        assert_eq!(Timeframe::SixtyMin.to_minutes(), 60);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Timeframe::from_str("5min").unwrap(), Timeframe::FiveMin);
        assert_eq!(Timeframe::from_str("5M").unwrap(), Timeframe::FiveMin);
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::SixtyMin);
        assert!(Timeframe::from_str("1day").is_err());
    }

    #[test]
    fn test_only_five_minute_bars_match_labels() {
        assert!(Timeframe::FiveMin.matches_horizon_labels());
        assert!(!Timeframe::OneMin.matches_horizon_labels());
    }
}
