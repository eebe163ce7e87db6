//! Inbound/outbound contracts for a transport layer.
//!
//! Requests are validated here before any bar reaches the pipeline. Errors
//! carry a status classification so an HTTP front end can map them
//! directly: request problems and insufficient data are client errors,
//! everything else is a server error.

use crate::application::ml::model_lifecycle::{Forecast, ModelLifecycleManager, ModelStatus};
use crate::domain::errors::AnalysisError;
use crate::domain::market::ohlcv::{Bar, OhlcvSeries};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info};

pub const MIN_REQUEST_RECORDS: usize = 30;
pub const MAX_REQUEST_DAYS: u32 = 365;

fn default_symbol() -> String {
    "SPY".to_string()
}

fn default_days() -> u32 {
    30
}

/// One market-data point as received. Every field is optional so that
/// missing values are reported by validation rather than by the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMarketRecord {
    pub symbol: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub source: Option<String>,
    pub indicators: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(rename = "marketData")]
    pub market_data: Vec<RawMarketRecord>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    #[error("At least {required} market data points are required for prediction, got {got}")]
    TooFewRecords { required: usize, got: usize },

    #[error("days must be between 1 and {max}, got {days}")]
    DaysOutOfRange { days: u32, max: u32 },

    #[error("Market data record {index} is missing {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("Market data contains invalid values: {reason}")]
    InvalidValues { reason: String },
}

impl PredictRequest {
    /// Checks the request and converts its records into a series ordered by
    /// timestamp.
    pub fn validate(&self) -> Result<OhlcvSeries, RequestError> {
        if !(1..=MAX_REQUEST_DAYS).contains(&self.days) {
            return Err(RequestError::DaysOutOfRange {
                days: self.days,
                max: MAX_REQUEST_DAYS,
            });
        }
        if self.market_data.len() < MIN_REQUEST_RECORDS {
            return Err(RequestError::TooFewRecords {
                required: MIN_REQUEST_RECORDS,
                got: self.market_data.len(),
            });
        }

        let mut bars = self
            .market_data
            .iter()
            .enumerate()
            .map(|(index, record)| record.to_bar(index))
            .collect::<Result<Vec<_>, _>>()?;
        bars.sort_by_key(|b| b.timestamp);

        OhlcvSeries::new(bars).map_err(|e| RequestError::InvalidValues {
            reason: e.to_string(),
        })
    }
}

impl RawMarketRecord {
    fn to_bar(&self, index: usize) -> Result<Bar, RequestError> {
        let require = |value: Option<f64>, field: &'static str| {
            value.ok_or(RequestError::MissingField { index, field })
        };
        Ok(Bar {
            timestamp: self
                .timestamp
                .ok_or(RequestError::MissingField {
                    index,
                    field: "timestamp",
                })?,
            open: require(self.open, "open")?,
            high: require(self.high, "high")?,
            low: require(self.low, "low")?,
            close: require(self.close, "close")?,
            volume: require(self.volume, "volume")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub symbol: String,
    /// Horizon label to predicted absolute price
    pub predictions: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
}

impl PredictResponse {
    pub fn from_forecast(symbol: &str, forecast: &Forecast) -> Self {
        Self {
            symbol: symbol.to_string(),
            predictions: forecast
                .horizons
                .iter()
                .map(|h| (h.horizon.clone(), h.price))
                .collect(),
            timestamp: Utc::now(),
            model_version: forecast.model_version.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub model_loaded: bool,
    pub model_version: Option<String>,
}

impl From<&ModelStatus> for HealthReport {
    fn from(status: &ModelStatus) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            model_loaded: status.model_loaded,
            model_version: status.model_version.map(|v| v.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Error generating predictions: {0}")]
    Analysis(#[from] AnalysisError),
}

impl ApiError {
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Analysis(e) => e.is_client_error(),
        }
    }

    pub fn status_code(&self) -> u16 {
        if self.is_client_error() { 400 } else { 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        let error = if err.is_client_error() {
            "Bad request"
        } else {
            "Internal server error"
        };
        Self {
            error: error.to_string(),
            detail: err.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Validates a prediction request and runs it through the lifecycle manager.
pub async fn handle_predict(
    manager: &ModelLifecycleManager,
    request: &PredictRequest,
) -> Result<PredictResponse, ApiError> {
    info!("Received prediction request for {}", request.symbol);
    let series = request.validate().inspect_err(|e| {
        error!("Rejected prediction request for {}: {}", request.symbol, e);
    })?;
    let forecast = manager.predict(&series).await?;
    info!("Successfully generated predictions for {}", request.symbol);
    Ok(PredictResponse::from_forecast(&request.symbol, &forecast))
}
