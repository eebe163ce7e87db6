//! Configuration module for marketcast.
//!
//! Structured configuration loading from environment variables, organized by
//! concern: market data and model. Missing values fall back to defaults;
//! values that are present but invalid are errors.

mod market_data_config;
mod model_config;

pub use market_data_config::MarketDataEnvConfig;
pub use model_config::ModelEnvConfig;

use crate::application::ml::model_lifecycle::LifecycleSettings;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub market_data: MarketDataEnvConfig,
    pub model: ModelEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            market_data: MarketDataEnvConfig::from_lookup(lookup)
                .context("Failed to load market data config")?,
            model: ModelEnvConfig::from_lookup(lookup).context("Failed to load model config")?,
        })
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            model_key: self.model.model_key.clone(),
            symbol: self.market_data.symbol.clone(),
            interval: self.market_data.interval,
            history_days: self.market_data.history_days,
            model: self.model.model.clone(),
        }
    }
}

pub(crate) fn var_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

pub(crate) fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Failed to parse {}", key)),
        None => Ok(default),
    }
}
