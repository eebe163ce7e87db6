//! Alpha Vantage market-data source.
//!
//! Intraday bars come from `TIME_SERIES_INTRADAY` (keyed `Time Series
//! (<interval>)`), quote snapshots from `GLOBAL_QUOTE`. Exchange-local
//! timestamps are taken as UTC wall-clock values.

use crate::domain::errors::FetchError;
use crate::domain::market::ohlcv::{Bar, OhlcvSeries};
use crate::domain::market::quote::Quote;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::MarketDataSource;
use crate::infrastructure::core::http_client_factory::{
    HttpClientFactory, build_url_with_query,
};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct AlphaVantageMarketDataSource {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
}

impl AlphaVantageMarketDataSource {
    pub fn builder() -> AlphaVantageMarketDataSourceBuilder {
        AlphaVantageMarketDataSourceBuilder::default()
    }

    async fn get_json(&self, symbol: &str, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("apikey", &self.api_key));
        let url = build_url_with_query(&self.base_url, &query);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("AlphaVantage: request for {} failed: {}", symbol, e);
            FetchError::Transport {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            error!("AlphaVantage: API returned status {} for {}", status, symbol);
            return Err(FetchError::Status {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| FetchError::MalformedPayload {
            symbol: symbol.to_string(),
            reason: format!("invalid JSON: {}", e),
        })
    }
}

#[async_trait]
impl MarketDataSource for AlphaVantageMarketDataSource {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<OhlcvSeries, FetchError> {
        debug!(
            "AlphaVantage: fetching {} {} bars from {} to {}",
            symbol, interval, start, end
        );
        let body = self
            .get_json(
                symbol,
                &[
                    ("function", "TIME_SERIES_INTRADAY"),
                    ("symbol", symbol),
                    ("interval", interval.to_alpha_vantage_string()),
                    ("outputsize", "full"),
                ],
            )
            .await?;

        let series = parse_intraday(symbol, interval, &body)?.between(start, end);
        if series.is_empty() {
            warn!("AlphaVantage: no {} bars inside the requested range", symbol);
            return Err(FetchError::Empty {
                symbol: symbol.to_string(),
            });
        }
        info!("Fetched {} data points for {}", series.len(), symbol);
        Ok(series)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        let body = self
            .get_json(symbol, &[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        parse_global_quote(symbol, &body)
    }
}

fn malformed(symbol: &str, reason: impl Into<String>) -> FetchError {
    FetchError::MalformedPayload {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

/// Provider-side errors and throttling notes come back as 200 responses.
fn provider_message(body: &Value) -> Option<&str> {
    ["Error Message", "Note", "Information"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
}

fn number(symbol: &str, fields: &Map<String, Value>, key: &str) -> Result<f64, FetchError> {
    let raw = fields
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(symbol, format!("missing field {:?}", key)))?;
    raw.trim_end_matches('%')
        .parse::<f64>()
        .map_err(|e| malformed(symbol, format!("field {:?} = {:?}: {}", key, raw, e)))
}

/// Parses a `TIME_SERIES_INTRADAY` body into a chronologically ordered series.
pub fn parse_intraday(
    symbol: &str,
    interval: Timeframe,
    body: &Value,
) -> Result<OhlcvSeries, FetchError> {
    let key = format!("Time Series ({})", interval.to_alpha_vantage_string());
    let entries = match body.get(&key).and_then(Value::as_object) {
        Some(entries) => entries,
        None => {
            let reason = provider_message(body)
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("missing {:?}", key));
            error!("AlphaVantage: unexpected payload for {}: {}", symbol, reason);
            return Err(malformed(symbol, reason));
        }
    };
    if entries.is_empty() {
        return Err(FetchError::Empty {
            symbol: symbol.to_string(),
        });
    }

    let mut bars = Vec::with_capacity(entries.len());
    for (stamp, fields) in entries {
        let fields = fields
            .as_object()
            .ok_or_else(|| malformed(symbol, format!("bar {} is not an object", stamp)))?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map_err(|e| malformed(symbol, format!("timestamp {:?}: {}", stamp, e)))?
            .and_utc();
        bars.push(Bar {
            timestamp,
            open: number(symbol, fields, "1. open")?,
            high: number(symbol, fields, "2. high")?,
            low: number(symbol, fields, "3. low")?,
            close: number(symbol, fields, "4. close")?,
            volume: number(symbol, fields, "5. volume")?,
        });
    }
    bars.sort_by_key(|b| b.timestamp);

    OhlcvSeries::new(bars).map_err(|e| malformed(symbol, e.to_string()))
}

/// Parses a `GLOBAL_QUOTE` body.
pub fn parse_global_quote(symbol: &str, body: &Value) -> Result<Quote, FetchError> {
    let quote = match body.get("Global Quote").and_then(Value::as_object) {
        Some(quote) => quote,
        None => {
            let reason = provider_message(body).unwrap_or("missing \"Global Quote\"");
            return Err(malformed(symbol, reason));
        }
    };
    if quote.is_empty() {
        return Err(FetchError::Empty {
            symbol: symbol.to_string(),
        });
    }
    Ok(Quote {
        symbol: quote
            .get("01. symbol")
            .and_then(Value::as_str)
            .unwrap_or(symbol)
            .to_string(),
        price: number(symbol, quote, "05. price")?,
        change_pct: number(symbol, quote, "10. change percent")?,
    })
}

#[derive(Default)]
pub struct AlphaVantageMarketDataSourceBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl AlphaVantageMarketDataSourceBuilder {
    pub fn api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<AlphaVantageMarketDataSource> {
        let api_key = match self.api_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => bail!("Alpha Vantage API key is required (set MARKET_API_KEY)"),
        };
        let client = match self.timeout {
            Some(timeout) => HttpClientFactory::create_client_with_timeout(timeout),
            None => HttpClientFactory::create_client(),
        };
        Ok(AlphaVantageMarketDataSource {
            client,
            api_key,
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}
