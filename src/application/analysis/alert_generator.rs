//! Heuristic market alerts over the latest panel rows.
//!
//! Checks run in a fixed order. A check whose inputs are unavailable or
//! undefined is skipped with a warning; the remaining checks still run.

use crate::application::market_data::series::{
    effective_period, last_finite, nan_mean, pct_change, rolling_mean, rolling_std,
};
use crate::domain::market::indicator_panel::{Indicator, IndicatorPanel};
use tracing::{info, warn};

pub const VOLATILITY_WINDOW: usize = 20;
pub const VOLATILITY_MULTIPLIER: f64 = 1.5;
pub const VOLUME_SPIKE_MULTIPLIER: f64 = 2.0;
pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;
/// Crossover checks need a previous and a current row plus one more.
pub const CROSSOVER_MIN_ROWS: usize = 3;

pub const VOLATILITY_ALERT: &str = "Unusual price volatility detected";
pub const VOLUME_ALERT: &str = "Unusual volume spike detected";
pub const MACD_BULLISH_ALERT: &str = "MACD bullish crossover detected";
pub const MACD_BEARISH_ALERT: &str = "MACD bearish crossover detected";
pub const RSI_OVERSOLD_ALERT: &str = "RSI indicates oversold conditions";
pub const RSI_OVERBOUGHT_ALERT: &str = "RSI indicates overbought conditions";
pub const MA_BULLISH_ALERT: &str = "Bullish moving average crossover (20 over 50)";
pub const MA_BEARISH_ALERT: &str = "Bearish moving average crossover (50 over 20)";

type CheckResult = Result<Option<&'static str>, String>;

const CHECKS: [(&str, fn(&IndicatorPanel) -> CheckResult); 5] = [
    ("volatility", volatility_check),
    ("volume", volume_check),
    ("MACD crossover", macd_crossover_check),
    ("RSI", rsi_check),
    ("MA crossover", ma_crossover_check),
];

/// Runs every alert check and returns the triggered messages in check order.
pub fn generate_alerts(panel: &IndicatorPanel) -> Vec<String> {
    let mut alerts = Vec::new();
    for (name, check) in CHECKS {
        match check(panel) {
            Ok(Some(alert)) => alerts.push(alert.to_string()),
            Ok(None) => {}
            Err(reason) => warn!("Skipping {} alert: {}", name, reason),
        }
    }
    info!("Generated {} market alerts", alerts.len());
    alerts
}

fn indicator(panel: &IndicatorPanel, ind: Indicator) -> Result<&[f64], String> {
    panel.values(ind).map_err(|e| e.to_string())
}

fn volatility_check(panel: &IndicatorPanel) -> CheckResult {
    let returns = pct_change(&panel.series().closes(), 1);
    let window = effective_period(VOLATILITY_WINDOW, panel.len());
    let volatility = rolling_std(&returns, window);
    let recent = last_finite(&volatility).ok_or("recent volatility undefined")?;
    let historical = nan_mean(&volatility).ok_or("historical volatility undefined")?;
    Ok((recent > historical * VOLATILITY_MULTIPLIER).then_some(VOLATILITY_ALERT))
}

fn volume_check(panel: &IndicatorPanel) -> CheckResult {
    let volumes = panel.series().volumes();
    let window = effective_period(VOLATILITY_WINDOW, panel.len());
    let average = last_finite(&rolling_mean(&volumes, window)).ok_or("average volume undefined")?;
    let recent = last_finite(&volumes).ok_or("no volume")?;
    Ok((recent > average * VOLUME_SPIKE_MULTIPLIER).then_some(VOLUME_ALERT))
}

/// Crossing of `fast` over `slow` between the last two rows.
fn crossover(
    fast: &[f64],
    slow: &[f64],
    bullish: &'static str,
    bearish: &'static str,
) -> CheckResult {
    let n = fast.len();
    if n < CROSSOVER_MIN_ROWS || slow.len() != n {
        return Ok(None);
    }
    let (f0, f1, s0, s1) = (fast[n - 2], fast[n - 1], slow[n - 2], slow[n - 1]);
    if f0 < s0 && f1 > s1 {
        Ok(Some(bullish))
    } else if f0 > s0 && f1 < s1 {
        Ok(Some(bearish))
    } else {
        Ok(None)
    }
}

fn macd_crossover_check(panel: &IndicatorPanel) -> CheckResult {
    crossover(
        indicator(panel, Indicator::Macd)?,
        indicator(panel, Indicator::MacdSignal)?,
        MACD_BULLISH_ALERT,
        MACD_BEARISH_ALERT,
    )
}

fn rsi_check(panel: &IndicatorPanel) -> CheckResult {
    let rsi = last_finite(indicator(panel, Indicator::Rsi)?).ok_or("RSI undefined")?;
    Ok(if rsi < RSI_OVERSOLD {
        Some(RSI_OVERSOLD_ALERT)
    } else if rsi > RSI_OVERBOUGHT {
        Some(RSI_OVERBOUGHT_ALERT)
    } else {
        None
    })
}

fn ma_crossover_check(panel: &IndicatorPanel) -> CheckResult {
    crossover(
        indicator(panel, Indicator::Sma20)?,
        indicator(panel, Indicator::Sma50)?,
        MA_BULLISH_ALERT,
        MA_BEARISH_ALERT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::market_data::indicator_engine::compute_indicators;
    use crate::domain::market::ohlcv::{Bar, OhlcvSeries};
    use chrono::{Duration, TimeZone, Utc};

    fn panel_from(closes: &[f64], volumes: &[f64]) -> IndicatorPanel {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| Bar {
                timestamp: start + Duration::minutes(5 * i as i64),
                open: c,
                high: c * 1.001,
                low: c * 0.999,
                close: c,
                volume: v,
            })
            .collect();
        compute_indicators(&OhlcvSeries::new(bars).unwrap()).unwrap()
    }

    #[test]
    fn test_volume_spike_on_last_bar() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.5).sin()).collect();
        let mut volumes = vec![1_000.0; 60];
        volumes[59] = 50_000.0;
        let alerts = generate_alerts(&panel_from(&closes, &volumes));
        assert!(alerts.contains(&VOLUME_ALERT.to_string()));
    }

    #[test]
    fn test_volatility_burst_on_last_bars() {
        let mut closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 0.01).collect();
        for (k, c) in closes.iter_mut().skip(75).enumerate() {
            *c += if k % 2 == 0 { 4.0 } else { -4.0 };
        }
        let volumes = vec![1_000.0; 80];
        let alerts = generate_alerts(&panel_from(&closes, &volumes));
        assert_eq!(alerts.first().map(String::as_str), Some(VOLATILITY_ALERT));
    }

    #[test]
    fn test_crossover_requires_three_rows() {
        assert_eq!(
            crossover(&[1.0, 3.0], &[2.0, 2.0], MA_BULLISH_ALERT, MA_BEARISH_ALERT),
            Ok(None)
        );
        assert_eq!(
            crossover(
                &[0.0, 1.0, 3.0],
                &[2.0, 2.0, 2.0],
                MA_BULLISH_ALERT,
                MA_BEARISH_ALERT
            ),
            Ok(Some(MA_BULLISH_ALERT))
        );
        assert_eq!(
            crossover(
                &[0.0, 3.0, 1.0],
                &[2.0, 2.0, 2.0],
                MA_BULLISH_ALERT,
                MA_BEARISH_ALERT
            ),
            Ok(Some(MA_BEARISH_ALERT))
        );
    }

    #[test]
    fn test_rsi_extremes_raise_alerts() {
        let volumes = vec![1_000.0; 80];

        let falling: Vec<f64> = (0..80).map(|i| 200.0 - i as f64 * 0.8).collect();
        let panel = panel_from(&falling, &volumes);
        let rsi = *panel.values(Indicator::Rsi).unwrap().last().unwrap();
        assert!(rsi < RSI_OVERSOLD, "rsi {}", rsi);
        let alerts = generate_alerts(&panel);
        assert!(alerts.contains(&RSI_OVERSOLD_ALERT.to_string()), "{:?}", alerts);
        assert!(!alerts.contains(&RSI_OVERBOUGHT_ALERT.to_string()));

        let rising: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 0.8).collect();
        let panel = panel_from(&rising, &volumes);
        let rsi = *panel.values(Indicator::Rsi).unwrap().last().unwrap();
        assert!(rsi > RSI_OVERBOUGHT, "rsi {}", rsi);
        let alerts = generate_alerts(&panel);
        assert!(alerts.contains(&RSI_OVERBOUGHT_ALERT.to_string()), "{:?}", alerts);
        assert!(!alerts.contains(&RSI_OVERSOLD_ALERT.to_string()));
    }

    #[test]
    fn test_rsi_in_neutral_band_raises_nothing() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.9).sin()).collect();
        let panel = panel_from(&closes, &vec![1_000.0; 80]);
        let rsi = *panel.values(Indicator::Rsi).unwrap().last().unwrap();
        let alerts = generate_alerts(&panel);
        if (RSI_OVERSOLD..=RSI_OVERBOUGHT).contains(&rsi) {
            assert!(!alerts.iter().any(|a| a.starts_with("RSI")), "{:?}", alerts);
        }
    }

    /// First prefix length whose last bar raises `alert`.
    fn first_bar_with(closes: &[f64], alert: &str, from: usize) -> Option<usize> {
        let volumes = vec![1_000.0; closes.len()];
        (from..=closes.len()).find(|&n| {
            generate_alerts(&panel_from(&closes[..n], &volumes[..n])).contains(&alert.to_string())
        })
    }

    #[test]
    fn test_macd_crossovers_after_trend_reversal() {
        // Falls for 60 bars, then rises
        let v_shape: Vec<f64> = (0..120)
            .map(|i| {
                if i < 60 {
                    150.0 - i as f64 * 0.5
                } else {
                    120.5 + (i - 59) as f64
                }
            })
            .collect();
        let n = first_bar_with(&v_shape, MACD_BULLISH_ALERT, 40).expect("no bullish MACD cross");
        assert!(n > 60, "bullish cross at {} before the reversal", n);
        let panel = panel_from(&v_shape[..n], &vec![1_000.0; n]);
        let macd = panel.values(Indicator::Macd).unwrap();
        let signal = panel.values(Indicator::MacdSignal).unwrap();
        assert!(macd[n - 2] < signal[n - 2] && macd[n - 1] > signal[n - 1]);

        let inverted: Vec<f64> = v_shape.iter().map(|c| 300.0 - c).collect();
        let n = first_bar_with(&inverted, MACD_BEARISH_ALERT, 40).expect("no bearish MACD cross");
        assert!(n > 60, "bearish cross at {} before the reversal", n);
        let panel = panel_from(&inverted[..n], &vec![1_000.0; n]);
        let macd = panel.values(Indicator::Macd).unwrap();
        let signal = panel.values(Indicator::MacdSignal).unwrap();
        assert!(macd[n - 2] > signal[n - 2] && macd[n - 1] < signal[n - 1]);
    }

    #[test]
    fn test_unavailable_column_skips_only_its_check() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.5).sin()).collect();
        let mut volumes = vec![1_000.0; 60];
        volumes[59] = 50_000.0;
        let mut bars: Vec<Bar> = panel_from(&closes, &volumes).series().bars().to_vec();
        // high below low breaks the OHLC-based indicators only
        bars[10].high = bars[10].low - 1.0;
        let panel = compute_indicators(&OhlcvSeries::new(bars).unwrap()).unwrap();
        assert!(!panel.column(Indicator::Atr).is_available());
        let alerts = generate_alerts(&panel);
        assert!(alerts.contains(&VOLUME_ALERT.to_string()));
    }
}
