//! Technical indicator panel computation.
//!
//! Every indicator is an independent job producing either its output columns
//! or a failure reason. Jobs run in parallel with rayon and are collected into
//! the panel without short-circuiting: a failed job becomes an unavailable
//! column and the remaining indicators are still computed.
//!
//! Warm-up rows of windowed indicators are left as gaps and filled afterwards
//! (forward, then backward), so every available column is fully populated.

use super::series::{effective_period, fill_gaps};
use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::market::indicator_panel::{Indicator, IndicatorColumn, IndicatorPanel};
use crate::domain::market::ohlcv::OhlcvSeries;
use rayon::prelude::*;
use std::collections::BTreeMap;
use ta::Next;
use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, FastStochastic,
    MovingAverageConvergenceDivergence, OnBalanceVolume, RelativeStrengthIndex,
    SimpleMovingAverage,
};
use tracing::{debug, warn};

pub const SMA_FAST_PERIOD: usize = 20;
pub const SMA_SLOW_PERIOD: usize = 50;
pub const EMA_PERIOD: usize = 20;
pub const MACD_FAST_PERIOD: usize = 12;
pub const MACD_SLOW_PERIOD: usize = 26;
pub const MACD_SIGNAL_PERIOD: usize = 9;
pub const RSI_PERIOD: usize = 14;
pub const BB_PERIOD: usize = 20;
pub const BB_STD_DEV: f64 = 2.0;
pub const STOCH_FASTK_PERIOD: usize = 14;
pub const STOCH_SLOWK_PERIOD: usize = 3;
pub const STOCH_SLOWD_PERIOD: usize = 3;
pub const ATR_PERIOD: usize = 14;

/// Minimum rows for a meaningful panel
pub const MIN_PANEL_ROWS: usize = 2;

type JobOutput = Result<Vec<(Indicator, Vec<f64>)>, String>;

#[derive(Debug, Clone, Copy)]
enum IndicatorJob {
    Sma20,
    Sma50,
    Ema20,
    Macd,
    Rsi,
    Bollinger,
    Stochastic,
    Atr,
    Obv,
}

impl IndicatorJob {
    const ALL: [IndicatorJob; 9] = [
        IndicatorJob::Sma20,
        IndicatorJob::Sma50,
        IndicatorJob::Ema20,
        IndicatorJob::Macd,
        IndicatorJob::Rsi,
        IndicatorJob::Bollinger,
        IndicatorJob::Stochastic,
        IndicatorJob::Atr,
        IndicatorJob::Obv,
    ];

    fn outputs(&self) -> &'static [Indicator] {
        match self {
            IndicatorJob::Sma20 => &[Indicator::Sma20],
            IndicatorJob::Sma50 => &[Indicator::Sma50],
            IndicatorJob::Ema20 => &[Indicator::Ema20],
            IndicatorJob::Macd => &[Indicator::Macd, Indicator::MacdSignal, Indicator::MacdHist],
            IndicatorJob::Rsi => &[Indicator::Rsi],
            IndicatorJob::Bollinger => &[Indicator::BbUpper, Indicator::BbMiddle, Indicator::BbLower],
            IndicatorJob::Stochastic => &[Indicator::StochK, Indicator::StochD],
            IndicatorJob::Atr => &[Indicator::Atr],
            IndicatorJob::Obv => &[Indicator::Obv],
        }
    }

    fn run(&self, input: &PanelInput) -> JobOutput {
        let rows = input.closes.len();
        match self {
            IndicatorJob::Sma20 => Ok(vec![(
                Indicator::Sma20,
                sma(&input.closes, effective_period(SMA_FAST_PERIOD, rows))?,
            )]),
            IndicatorJob::Sma50 => Ok(vec![(
                Indicator::Sma50,
                sma(&input.closes, effective_period(SMA_SLOW_PERIOD, rows))?,
            )]),
            IndicatorJob::Ema20 => Ok(vec![(
                Indicator::Ema20,
                ema(&input.closes, effective_period(EMA_PERIOD, rows))?,
            )]),
            IndicatorJob::Macd => macd(&input.closes, rows),
            IndicatorJob::Rsi => Ok(vec![(
                Indicator::Rsi,
                rsi(&input.closes, effective_period(RSI_PERIOD, rows))?,
            )]),
            IndicatorJob::Bollinger => bollinger(&input.closes, effective_period(BB_PERIOD, rows)),
            IndicatorJob::Stochastic => stochastic(input.items()?, rows),
            IndicatorJob::Atr => Ok(vec![(
                Indicator::Atr,
                atr(input.items()?, effective_period(ATR_PERIOD, rows))?,
            )]),
            IndicatorJob::Obv => Ok(vec![(Indicator::Obv, obv(input.items()?))]),
        }
    }
}

/// Per-row inputs shared by all jobs.
struct PanelInput {
    closes: Vec<f64>,
    items: Result<Vec<ta::DataItem>, String>,
}

impl PanelInput {
    fn new(series: &OhlcvSeries) -> Self {
        let items = series
            .bars()
            .iter()
            .enumerate()
            .map(|(idx, bar)| {
                ta::DataItem::builder()
                    .open(bar.open)
                    .high(bar.high)
                    .low(bar.low)
                    .close(bar.close)
                    .volume(bar.volume)
                    .build()
                    .map_err(|e| format!("inconsistent OHLCV values in record {}: {:?}", idx, e))
            })
            .collect();
        Self {
            closes: series.closes(),
            items,
        }
    }

    fn items(&self) -> Result<&[ta::DataItem], String> {
        self.items.as_deref().map_err(|e| e.clone())
    }
}

/// Computes the indicator panel for `series`.
///
/// Requires at least two rows. Each indicator's lookback is capped at
/// `rows - 1` so short series still yield values. Individual indicator
/// failures are logged and recorded as unavailable columns.
pub fn compute_indicators(series: &OhlcvSeries) -> AnalysisResult<IndicatorPanel> {
    let rows = series.len();
    if rows < MIN_PANEL_ROWS {
        return Err(AnalysisError::insufficient(
            "indicator computation",
            MIN_PANEL_ROWS,
            rows,
        ));
    }
    if rows < SMA_SLOW_PERIOD {
        warn!(
            "Insufficient data points ({}) for all indicators. Using available data.",
            rows
        );
    }

    let input = PanelInput::new(series);
    let results: Vec<(IndicatorJob, JobOutput)> = IndicatorJob::ALL
        .par_iter()
        .map(|job| (*job, job.run(&input)))
        .collect();

    let mut columns = BTreeMap::new();
    for (job, result) in results {
        match result {
            Ok(outputs) => {
                for (indicator, mut values) in outputs {
                    fill_gaps(&mut values);
                    let column = if values.iter().all(|v| v.is_finite()) {
                        IndicatorColumn::Available(values)
                    } else {
                        warn!("Indicator {} produced no usable values", indicator);
                        IndicatorColumn::Unavailable {
                            reason: "no finite values after gap filling".to_string(),
                        }
                    };
                    columns.insert(indicator, column);
                }
            }
            Err(reason) => {
                for indicator in job.outputs() {
                    warn!("Error calculating {}: {}", indicator, reason);
                    columns.insert(
                        *indicator,
                        IndicatorColumn::Unavailable {
                            reason: reason.clone(),
                        },
                    );
                }
            }
        }
    }

    debug!("Computed indicator panel over {} rows", rows);
    IndicatorPanel::new(series.clone(), columns)
}

/// Blanks the first `lookback` values, which are warm-up output. The last row
/// is always kept so short series still carry a value.
fn mask_warmup(mut values: Vec<f64>, lookback: usize) -> Vec<f64> {
    let masked = lookback.min(values.len().saturating_sub(1));
    for v in values.iter_mut().take(masked) {
        *v = f64::NAN;
    }
    values
}

fn param_err<E: std::fmt::Debug>(name: &str, period: usize) -> impl Fn(E) -> String + '_ {
    move |e| format!("invalid {} period {}: {:?}", name, period, e)
}

/// Oscillators are undefined (0/0) over a flat window; they read as neutral.
fn neutral_if_flat(value: f64) -> f64 {
    if value.is_nan() { 50.0 } else { value }
}

fn sma(values: &[f64], period: usize) -> Result<Vec<f64>, String> {
    let mut ind = SimpleMovingAverage::new(period).map_err(param_err("SMA", period))?;
    let out = values.iter().map(|&v| ind.next(v)).collect();
    Ok(mask_warmup(out, period.saturating_sub(1)))
}

fn ema(values: &[f64], period: usize) -> Result<Vec<f64>, String> {
    let mut ind = ExponentialMovingAverage::new(period).map_err(param_err("EMA", period))?;
    let out = values.iter().map(|&v| ind.next(v)).collect();
    Ok(mask_warmup(out, period.saturating_sub(1)))
}

/// `ta` smooths with k = 2 / (n + 1); RSI and ATR use Wilder's k = 1 / n,
/// which is the same average over `2n - 1` periods.
fn wilder_span(period: usize) -> usize {
    (2 * period).saturating_sub(1).max(1)
}

fn rsi(values: &[f64], period: usize) -> Result<Vec<f64>, String> {
    let span = wilder_span(period);
    let mut ind = RelativeStrengthIndex::new(span).map_err(param_err("RSI", span))?;
    let out = values.iter().map(|&v| neutral_if_flat(ind.next(v))).collect();
    Ok(mask_warmup(out, period))
}

fn macd(values: &[f64], rows: usize) -> JobOutput {
    let fast = effective_period(MACD_FAST_PERIOD, rows);
    let slow = effective_period(MACD_SLOW_PERIOD, rows);
    let signal = effective_period(MACD_SIGNAL_PERIOD, rows);
    let mut ind = MovingAverageConvergenceDivergence::new(fast, slow, signal)
        .map_err(|e| format!("invalid MACD periods {}/{}/{}: {:?}", fast, slow, signal, e))?;

    let mut line = Vec::with_capacity(values.len());
    let mut sig = Vec::with_capacity(values.len());
    let mut hist = Vec::with_capacity(values.len());
    for &v in values {
        let out = ind.next(v);
        line.push(out.macd);
        sig.push(out.signal);
        hist.push(out.histogram);
    }

    let lookback = slow.saturating_sub(1) + signal.saturating_sub(1);
    Ok(vec![
        (Indicator::Macd, mask_warmup(line, lookback)),
        (Indicator::MacdSignal, mask_warmup(sig, lookback)),
        (Indicator::MacdHist, mask_warmup(hist, lookback)),
    ])
}

fn bollinger(values: &[f64], period: usize) -> JobOutput {
    let mut ind = BollingerBands::new(period, BB_STD_DEV).map_err(param_err("Bollinger", period))?;

    let mut upper = Vec::with_capacity(values.len());
    let mut middle = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());
    for &v in values {
        let out = ind.next(v);
        upper.push(out.upper);
        middle.push(out.average);
        lower.push(out.lower);
    }

    let lookback = period.saturating_sub(1);
    Ok(vec![
        (Indicator::BbUpper, mask_warmup(upper, lookback)),
        (Indicator::BbMiddle, mask_warmup(middle, lookback)),
        (Indicator::BbLower, mask_warmup(lower, lookback)),
    ])
}

/// Slow stochastic: raw %K over `fastk` bars, smoothed by simple averages
/// into slow %K and %D.
fn stochastic(items: &[ta::DataItem], rows: usize) -> JobOutput {
    let fastk = effective_period(STOCH_FASTK_PERIOD, rows);
    let slowk = effective_period(STOCH_SLOWK_PERIOD, rows);
    let slowd = effective_period(STOCH_SLOWD_PERIOD, rows);

    let mut raw_k = FastStochastic::new(fastk).map_err(param_err("stochastic %K", fastk))?;
    let mut smooth_k = SimpleMovingAverage::new(slowk).map_err(param_err("stochastic slow %K", slowk))?;
    let mut smooth_d = SimpleMovingAverage::new(slowd).map_err(param_err("stochastic %D", slowd))?;

    let mut k = Vec::with_capacity(items.len());
    let mut d = Vec::with_capacity(items.len());
    for item in items {
        let slow_k = smooth_k.next(neutral_if_flat(raw_k.next(item)));
        k.push(slow_k);
        d.push(smooth_d.next(slow_k));
    }

    let lookback = fastk.saturating_sub(1) + slowk.saturating_sub(1) + slowd.saturating_sub(1);
    Ok(vec![
        (Indicator::StochK, mask_warmup(k, lookback)),
        (Indicator::StochD, mask_warmup(d, lookback)),
    ])
}

fn atr(items: &[ta::DataItem], period: usize) -> Result<Vec<f64>, String> {
    let span = wilder_span(period);
    let mut ind = AverageTrueRange::new(span).map_err(param_err("ATR", span))?;
    let out = items.iter().map(|item| ind.next(item)).collect();
    Ok(mask_warmup(out, period))
}

fn obv(items: &[ta::DataItem]) -> Vec<f64> {
    let mut ind = OnBalanceVolume::new();
    items.iter().map(|item| ind.next(item)).collect()
}
