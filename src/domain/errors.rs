use thiserror::Error;

/// Failures of the market-data source. Transport problems, timeouts,
/// non-success statuses and malformed payloads are all fetch failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("Transport failure while fetching {symbol}: {reason}")]
    Transport { symbol: String, reason: String },

    #[error("Market data API returned status {status} for {symbol}")]
    Status { symbol: String, status: u16 },

    #[error("Malformed market data payload for {symbol}: {reason}")]
    MalformedPayload { symbol: String, reason: String },

    #[error("No data found for {symbol} in the requested range")]
    Empty { symbol: String },
}

/// Errors raised by the analysis pipeline.
///
/// Indicator-level failures never surface here from the indicator engine
/// itself (they become unavailable columns); `IndicatorComputation` is raised
/// by consumers that cannot work around a degraded column.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    #[error("Data fetch failed: {0}")]
    DataFetch(#[from] FetchError),

    #[error("Insufficient data for {stage}: need at least {required} rows, got {available}")]
    InsufficientData {
        stage: &'static str,
        required: usize,
        available: usize,
    },

    #[error("Indicator {indicator} unavailable: {reason}")]
    IndicatorComputation { indicator: String, reason: String },

    #[error("Invalid OHLCV series: {reason}")]
    InvalidSeries { reason: String },

    #[error("Model not ready: {reason}")]
    ModelNotReady { reason: String },

    #[error("Training failed: {reason}")]
    Training { reason: String },

    #[error("Artifact I/O failed for {key}: {reason}")]
    ArtifactIo { key: String, reason: String },
}

impl AnalysisError {
    pub fn insufficient(stage: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            stage,
            required,
            available,
        }
    }

    /// True when the caller supplied data that can never satisfy the request.
    /// The transport layer maps these to client errors and everything else to
    /// server errors.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::InvalidSeries { .. }
        )
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_formatting() {
        let err = AnalysisError::insufficient("prediction", 60, 30);
        let msg = err.to_string();
        assert!(msg.contains("prediction"));
        assert!(msg.contains("60"));
        assert!(msg.contains("30"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_fetch_error_wraps_into_analysis_error() {
        let err: AnalysisError = FetchError::Status {
            symbol: "SPY".to_string(),
            status: 503,
        }
        .into();
        assert!(err.to_string().contains("503"));
        assert!(!err.is_client_error());
    }
}
