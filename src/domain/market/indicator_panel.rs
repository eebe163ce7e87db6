use super::ohlcv::OhlcvSeries;
use crate::domain::errors::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Derived columns of the indicator panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Indicator {
    Sma20,
    Sma50,
    Ema20,
    Macd,
    MacdSignal,
    MacdHist,
    Rsi,
    BbUpper,
    BbMiddle,
    BbLower,
    StochK,
    StochD,
    Atr,
    Obv,
}

impl Indicator {
    pub const ALL: [Indicator; 14] = [
        Indicator::Sma20,
        Indicator::Sma50,
        Indicator::Ema20,
        Indicator::Macd,
        Indicator::MacdSignal,
        Indicator::MacdHist,
        Indicator::Rsi,
        Indicator::BbUpper,
        Indicator::BbMiddle,
        Indicator::BbLower,
        Indicator::StochK,
        Indicator::StochD,
        Indicator::Atr,
        Indicator::Obv,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Indicator::Sma20 => "sma_20",
            Indicator::Sma50 => "sma_50",
            Indicator::Ema20 => "ema_20",
            Indicator::Macd => "macd",
            Indicator::MacdSignal => "macd_signal",
            Indicator::MacdHist => "macd_hist",
            Indicator::Rsi => "rsi",
            Indicator::BbUpper => "bb_upper",
            Indicator::BbMiddle => "bb_middle",
            Indicator::BbLower => "bb_lower",
            Indicator::StochK => "stoch_k",
            Indicator::StochD => "stoch_d",
            Indicator::Atr => "atr",
            Indicator::Obv => "obv",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A derived column: either fully populated or explicitly unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndicatorColumn {
    Available(Vec<f64>),
    Unavailable { reason: String },
}

impl IndicatorColumn {
    pub fn values(&self) -> Option<&[f64]> {
        match self {
            IndicatorColumn::Available(values) => Some(values),
            IndicatorColumn::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, IndicatorColumn::Available(_))
    }
}

/// OHLCV series enriched with technical indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PanelParts")]
pub struct IndicatorPanel {
    series: OhlcvSeries,
    columns: BTreeMap<Indicator, IndicatorColumn>,
}

/// Unchecked wire form; deserialized panels go through `IndicatorPanel::new`.
#[derive(Deserialize)]
struct PanelParts {
    series: OhlcvSeries,
    columns: BTreeMap<Indicator, IndicatorColumn>,
}

impl TryFrom<PanelParts> for IndicatorPanel {
    type Error = AnalysisError;

    fn try_from(parts: PanelParts) -> Result<Self, Self::Error> {
        Self::new(parts.series, parts.columns)
    }
}

impl IndicatorPanel {
    /// Assembles a panel. Every indicator must be present, and available
    /// columns must match the series length.
    pub fn new(
        series: OhlcvSeries,
        columns: BTreeMap<Indicator, IndicatorColumn>,
    ) -> AnalysisResult<Self> {
        for indicator in Indicator::ALL {
            match columns.get(&indicator) {
                None => {
                    return Err(AnalysisError::IndicatorComputation {
                        indicator: indicator.to_string(),
                        reason: "column missing from panel".to_string(),
                    });
                }
                Some(IndicatorColumn::Available(values)) if values.len() != series.len() => {
                    return Err(AnalysisError::IndicatorComputation {
                        indicator: indicator.to_string(),
                        reason: format!(
                            "column has {} values for {} rows",
                            values.len(),
                            series.len()
                        ),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(Self { series, columns })
    }

    pub fn series(&self) -> &OhlcvSeries {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn column(&self, indicator: Indicator) -> &IndicatorColumn {
        // Presence of every indicator is checked in `new`.
        &self.columns[&indicator]
    }

    /// Values of an indicator, or an error naming why it is unavailable.
    pub fn values(&self, indicator: Indicator) -> AnalysisResult<&[f64]> {
        match self.column(indicator) {
            IndicatorColumn::Available(values) => Ok(values),
            IndicatorColumn::Unavailable { reason } => Err(AnalysisError::IndicatorComputation {
                indicator: indicator.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    pub fn unavailable(&self) -> Vec<Indicator> {
        self.columns
            .iter()
            .filter(|(_, col)| !col.is_available())
            .map(|(ind, _)| *ind)
            .collect()
    }

    /// The last `n` rows of the panel (all rows if shorter).
    pub fn tail(&self, n: usize) -> Self {
        let len = self.len();
        let start = len.saturating_sub(n);
        let columns = self
            .columns
            .iter()
            .map(|(ind, col)| {
                let col = match col {
                    IndicatorColumn::Available(values) => {
                        IndicatorColumn::Available(values[start..].to_vec())
                    }
                    other => other.clone(),
                };
                (*ind, col)
            })
            .collect();
        Self {
            series: self.series.tail(n),
            columns,
        }
    }
}
