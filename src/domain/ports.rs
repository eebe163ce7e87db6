use crate::domain::errors::FetchError;
use crate::domain::market::ohlcv::OhlcvSeries;
use crate::domain::market::quote::Quote;
use crate::domain::market::timeframe::Timeframe;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of historical OHLCV data and quote snapshots.
///
/// Implementations never substitute data on failure: transport errors,
/// timeouts, non-success statuses, malformed payloads and empty results are
/// all reported as `FetchError`.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Bars of `symbol` at `interval` within `[start, end]`, oldest first.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<OhlcvSeries, FetchError>;

    /// Latest quote snapshot of `symbol`.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError>;
}
