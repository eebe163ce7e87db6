//! In-memory market-data source for tests and offline runs.
//!
//! Serves only what it was given: unknown symbols and empty ranges are
//! reported as `FetchError::Empty`, and a symbol can be set to fail.

use crate::domain::errors::FetchError;
use crate::domain::market::ohlcv::OhlcvSeries;
use crate::domain::market::quote::Quote;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::MarketDataSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Default)]
pub struct InMemoryMarketDataSource {
    series: HashMap<String, OhlcvSeries>,
    quotes: HashMap<String, Quote>,
    failing: HashSet<String>,
    latency: Option<Duration>,
    ohlcv_fetches: Arc<AtomicUsize>,
}

impl InMemoryMarketDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, series: OhlcvSeries) -> Self {
        self.series.insert(symbol.to_string(), series);
        self
    }

    pub fn with_quote(mut self, quote: Quote) -> Self {
        self.quotes.insert(quote.symbol.clone(), quote);
        self
    }

    /// Every request for `symbol` fails with a transport error.
    pub fn with_failure(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    /// Delay applied to every OHLCV fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `fetch_ohlcv` calls so far.
    pub fn ohlcv_fetches(&self) -> usize {
        self.ohlcv_fetches.load(Ordering::SeqCst)
    }

    fn check_failure(&self, symbol: &str) -> Result<(), FetchError> {
        if self.failing.contains(symbol) {
            return Err(FetchError::Transport {
                symbol: symbol.to_string(),
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataSource for InMemoryMarketDataSource {
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<OhlcvSeries, FetchError> {
        self.ohlcv_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.check_failure(symbol)?;
        debug!("InMemoryMarketDataSource: serving {} {} bars", symbol, interval);

        let series = self
            .series
            .get(symbol)
            .map(|s| s.between(start, end))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FetchError::Empty {
                symbol: symbol.to_string(),
            })?;
        Ok(series)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        self.check_failure(symbol)?;
        self.quotes.get(symbol).cloned().ok_or_else(|| FetchError::Empty {
            symbol: symbol.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::ohlcv::Bar;
    use chrono::Duration as ChronoDuration;

    fn series(start: DateTime<Utc>, n: usize) -> OhlcvSeries {
        let bars = (0..n)
            .map(|i| Bar {
                timestamp: start + ChronoDuration::minutes(5 * i as i64),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
                volume: 100.0,
            })
            .collect();
        OhlcvSeries::new(bars).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_filters_range_and_counts_calls() {
        let start = Utc::now() - ChronoDuration::hours(2);
        let source = InMemoryMarketDataSource::new().with_series("SPY", series(start, 24));
        let got = source
            .fetch_ohlcv(
                "SPY",
                Timeframe::FiveMin,
                start + ChronoDuration::minutes(30),
                start + ChronoDuration::minutes(60),
            )
            .await
            .unwrap();
        assert_eq!(got.len(), 7);
        assert_eq!(source.ohlcv_fetches(), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_failing_symbols() {
        let source = InMemoryMarketDataSource::new().with_failure("TSLA");
        let now = Utc::now();
        assert!(matches!(
            source
                .fetch_ohlcv("AAPL", Timeframe::FiveMin, now, now)
                .await,
            Err(FetchError::Empty { .. })
        ));
        assert!(matches!(
            source.fetch_quote("TSLA").await,
            Err(FetchError::Transport { .. })
        ));
    }
}
