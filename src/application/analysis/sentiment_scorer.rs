//! Rule-based market sentiment over the most recent panel rows.

use crate::domain::market::indicator_panel::{Indicator, IndicatorPanel};
use crate::domain::sentiment::{SentimentCategory, SentimentReport, SignalBreakdown};
use tracing::{info, warn};

pub const DEFAULT_SENTIMENT_LOOKBACK: usize = 14;

/// A row-wise condition on the panel window.
type Condition = fn(&Row) -> bool;

struct Row {
    close: f64,
    rsi: Option<f64>,
    macd: Option<f64>,
    macd_signal: Option<f64>,
    sma_50: Option<f64>,
    bb_upper: Option<f64>,
    bb_lower: Option<f64>,
    stoch_k: Option<f64>,
    stoch_d: Option<f64>,
}

fn lt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}

const BULLISH: [(&str, Condition); 5] = [
    ("rsi_bullish", |r| lt(r.rsi, Some(30.0))),
    ("macd_bullish", |r| lt(r.macd_signal, r.macd)),
    ("ma_bullish", |r| lt(r.sma_50, Some(r.close))),
    ("bb_bullish", |r| lt(Some(r.close), r.bb_lower)),
    ("stoch_bullish", |r| {
        lt(r.stoch_k, Some(20.0)) && lt(r.stoch_d, r.stoch_k)
    }),
];

const BEARISH: [(&str, Condition); 5] = [
    ("rsi_bearish", |r| lt(Some(70.0), r.rsi)),
    ("macd_bearish", |r| lt(r.macd, r.macd_signal)),
    ("ma_bearish", |r| lt(Some(r.close), r.sma_50)),
    ("bb_bearish", |r| lt(r.bb_upper, Some(r.close))),
    ("stoch_bearish", |r| {
        lt(Some(80.0), r.stoch_k) && lt(r.stoch_k, r.stoch_d)
    }),
];

fn rows(panel: &IndicatorPanel) -> Vec<Row> {
    let column = |ind: Indicator| panel.column(ind).values();
    let at = |values: Option<&[f64]>, i: usize| values.map(|v| v[i]).filter(|v| v.is_finite());

    let rsi = column(Indicator::Rsi);
    let macd = column(Indicator::Macd);
    let macd_signal = column(Indicator::MacdSignal);
    let sma_50 = column(Indicator::Sma50);
    let bb_upper = column(Indicator::BbUpper);
    let bb_lower = column(Indicator::BbLower);
    let stoch_k = column(Indicator::StochK);
    let stoch_d = column(Indicator::StochD);

    panel
        .series()
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| Row {
            close: bar.close,
            rsi: at(rsi, i),
            macd: at(macd, i),
            macd_signal: at(macd_signal, i),
            sma_50: at(sma_50, i),
            bb_upper: at(bb_upper, i),
            bb_lower: at(bb_lower, i),
            stoch_k: at(stoch_k, i),
            stoch_d: at(stoch_d, i),
        })
        .collect()
}

fn rate(rows: &[Row], condition: Condition) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().filter(|r| condition(r)).count() as f64 / rows.len() as f64
}

/// Scores the last `lookback` rows of `panel`. Conditions on an unavailable
/// column never hold, so its rates are 0.
pub fn score_sentiment(panel: &IndicatorPanel, lookback: usize) -> SentimentReport {
    let window = panel.tail(lookback);
    if window.len() < lookback {
        warn!(
            "Sentiment analysis using {} data points instead of requested {}",
            window.len(),
            lookback
        );
    }
    for ind in window.unavailable() {
        warn!("Sentiment signals on {} are disabled: column unavailable", ind);
    }

    let rows = rows(&window);
    let mut signal_breakdown = SignalBreakdown::new();
    let mut side_score = |signals: &[(&str, Condition); 5]| {
        let total: f64 = signals
            .iter()
            .map(|(name, condition)| {
                let r = rate(&rows, *condition);
                signal_breakdown.insert(name.to_string(), r);
                r
            })
            .sum();
        total / signals.len() as f64
    };
    let bullish = side_score(&BULLISH);
    let bearish = side_score(&BEARISH);

    let score = bullish - bearish;
    let category = SentimentCategory::from_score(score);
    info!("Market sentiment analysis: {} with score {:.2}", category, score);

    SentimentReport {
        category,
        score,
        signal_breakdown,
    }
}
