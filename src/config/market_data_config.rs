//! Market-data provider configuration parsing from environment variables.

use super::{parse_or, var_or};
use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// Market-data environment configuration
#[derive(Debug, Clone)]
pub struct MarketDataEnvConfig {
    /// `MARKET_API_KEY`; required only by the Alpha Vantage source
    pub api_key: Option<String>,
    pub base_url: String,
    pub interval: Timeframe,
    pub symbol: String,
    pub history_days: i64,
    pub request_timeout: Duration,
}

impl MarketDataEnvConfig {
    pub(crate) fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let interval_str = var_or(lookup, "MARKET_INTERVAL", "5min");
        let interval = Timeframe::from_str(&interval_str).context("Failed to parse MARKET_INTERVAL")?;

        let history_days: i64 = parse_or(lookup, "MARKET_HISTORY_DAYS", 60)?;
        if history_days <= 0 {
            anyhow::bail!("MARKET_HISTORY_DAYS must be positive, got {}", history_days);
        }

        let timeout_secs: u64 = parse_or(lookup, "MARKET_TIMEOUT_SECS", 10)?;

        Ok(Self {
            api_key: lookup("MARKET_API_KEY").filter(|k| !k.trim().is_empty()),
            base_url: var_or(
                lookup,
                "MARKET_BASE_URL",
                crate::infrastructure::alpha_vantage::DEFAULT_BASE_URL,
            ),
            interval,
            symbol: var_or(lookup, "MARKET_SYMBOL", "SPY"),
            history_days,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
