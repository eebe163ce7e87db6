use crate::domain::errors::{AnalysisError, AnalysisResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
    }
}

/// Time-ordered OHLCV bars.
///
/// Construction validates the whole set: timestamps strictly increasing and
/// every numeric field finite. One bad record rejects the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvSeries {
    bars: Vec<Bar>,
}

impl OhlcvSeries {
    pub fn new(bars: Vec<Bar>) -> AnalysisResult<Self> {
        for (idx, bar) in bars.iter().enumerate() {
            if let Some((name, _)) = bar.fields().iter().find(|(_, v)| !v.is_finite()) {
                return Err(AnalysisError::InvalidSeries {
                    reason: format!("field {} of record {} is not a finite number", name, idx),
                });
            }
        }

        if let Some(idx) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(AnalysisError::InvalidSeries {
                reason: format!(
                    "timestamps must be strictly increasing (record {} at {} follows {})",
                    idx + 1,
                    bars[idx + 1].timestamp,
                    bars[idx].timestamp
                ),
            });
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Bars within `[start, end]`, preserving order.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            bars: self
                .bars
                .iter()
                .filter(|b| b.timestamp >= start && b.timestamp <= end)
                .copied()
                .collect(),
        }
    }

    /// The first `n` bars. Used to replay the panel state at an earlier bar.
    pub fn head(&self, n: usize) -> Self {
        Self {
            bars: self.bars[..n.min(self.bars.len())].to_vec(),
        }
    }

    /// The last `n` bars.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.bars.len().saturating_sub(n);
        Self {
            bars: self.bars[start..].to_vec(),
        }
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}
