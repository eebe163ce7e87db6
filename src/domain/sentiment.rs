use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentCategory {
    Bearish,
    #[serde(rename = "Slightly Bearish")]
    SlightlyBearish,
    Neutral,
    #[serde(rename = "Slightly Bullish")]
    SlightlyBullish,
    Bullish,
}

impl fmt::Display for SentimentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearish => write!(f, "Bearish"),
            Self::SlightlyBearish => write!(f, "Slightly Bearish"),
            Self::Neutral => write!(f, "Neutral"),
            Self::SlightlyBullish => write!(f, "Slightly Bullish"),
            Self::Bullish => write!(f, "Bullish"),
        }
    }
}

impl SentimentCategory {
    /// Buckets a net score in [-1, 1]. Lower bounds are inclusive.
    pub fn from_score(score: f64) -> Self {
        if score < -0.6 {
            Self::Bearish
        } else if score < -0.2 {
            Self::SlightlyBearish
        } else if score < 0.2 {
            Self::Neutral
        } else if score < 0.6 {
            Self::SlightlyBullish
        } else {
            Self::Bullish
        }
    }
}

/// Named signal rates, each the fraction of rows satisfying a condition.
pub type SignalBreakdown = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub category: SentimentCategory,
    /// Bullish minus bearish score, in [-1, 1]
    pub score: f64,
    pub signal_breakdown: SignalBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_boundaries() {
        assert_eq!(SentimentCategory::from_score(-1.0), SentimentCategory::Bearish);
        assert_eq!(SentimentCategory::from_score(-0.61), SentimentCategory::Bearish);
        assert_eq!(
            SentimentCategory::from_score(-0.6),
            SentimentCategory::SlightlyBearish
        );
        assert_eq!(SentimentCategory::from_score(-0.2), SentimentCategory::Neutral);
        assert_eq!(SentimentCategory::from_score(0.0), SentimentCategory::Neutral);
        assert_eq!(
            SentimentCategory::from_score(0.2),
            SentimentCategory::SlightlyBullish
        );
        assert_eq!(SentimentCategory::from_score(0.6), SentimentCategory::Bullish);
        assert_eq!(SentimentCategory::from_score(1.0), SentimentCategory::Bullish);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(SentimentCategory::SlightlyBearish.to_string(), "Slightly Bearish");
        assert_eq!(SentimentCategory::Bullish.to_string(), "Bullish");
    }

    #[test]
    fn test_serialized_names_match_display() {
        let all = [
            SentimentCategory::Bearish,
            SentimentCategory::SlightlyBearish,
            SentimentCategory::Neutral,
            SentimentCategory::SlightlyBullish,
            SentimentCategory::Bullish,
        ];
        for category in all {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, serde_json::Value::String(category.to_string()));
            let back: SentimentCategory = serde_json::from_value(json).unwrap();
            assert_eq!(back, category);
        }

        let report = SentimentReport {
            category: SentimentCategory::SlightlyBearish,
            score: -0.4,
            signal_breakdown: SignalBreakdown::new(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["category"], "Slightly Bearish");
    }
}
