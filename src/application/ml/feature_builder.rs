//! Feature matrix, forward labels and sequence windows for the forecaster.

use crate::application::market_data::series::{
    effective_period, fill_gaps, forward_pct_change, pct_change, rolling_std,
};
use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::market::indicator_panel::{Indicator, IndicatorPanel};
use crate::domain::ml::feature_registry::{
    FEATURE_NAMES, HORIZONS, MIN_TRAINING_MARGIN, NUM_FEATURES, RETURN_VOLATILITY_WINDOW,
    feature_names,
};
use crate::domain::ml::scaler::MinMaxScaler;
use ndarray::{Array2, Array3, Axis, s};
use tracing::{error, info};

/// Fraction of (window, label) pairs held out for validation.
pub const TEST_FRACTION: f64 = 0.2;

/// Training data produced from one panel.
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    /// `(samples, look_back, features)`
    pub train_x: Array3<f64>,
    pub test_x: Array3<f64>,
    /// `(samples, horizons)`
    pub train_y: Array2<f64>,
    pub test_y: Array2<f64>,
    pub feature_names: Vec<String>,
    /// Scaler fitted on the full feature matrix; pairs with the model trained
    /// on this dataset.
    pub scaler: MinMaxScaler,
}

/// Raw (unscaled) feature matrix of a panel, `(rows, 20)`, in
/// `FEATURE_NAMES` order. Return and return volatility are undefined (`NaN`)
/// during their warm-up.
pub fn feature_matrix(panel: &IndicatorPanel) -> AnalysisResult<Array2<f64>> {
    let series = panel.series();
    let rows = panel.len();
    let closes = series.closes();
    let returns = pct_change(&closes, 1);
    let window = effective_period(RETURN_VOLATILITY_WINDOW, rows);
    let volatility = rolling_std(&returns, window);

    let columns: [Vec<f64>; NUM_FEATURES] = [
        series.opens(),
        series.highs(),
        series.lows(),
        closes,
        series.volumes(),
        panel.values(Indicator::Sma20)?.to_vec(),
        panel.values(Indicator::Sma50)?.to_vec(),
        panel.values(Indicator::Ema20)?.to_vec(),
        panel.values(Indicator::Macd)?.to_vec(),
        panel.values(Indicator::MacdSignal)?.to_vec(),
        panel.values(Indicator::MacdHist)?.to_vec(),
        panel.values(Indicator::Rsi)?.to_vec(),
        panel.values(Indicator::BbUpper)?.to_vec(),
        panel.values(Indicator::BbMiddle)?.to_vec(),
        panel.values(Indicator::BbLower)?.to_vec(),
        panel.values(Indicator::StochK)?.to_vec(),
        panel.values(Indicator::StochD)?.to_vec(),
        panel.values(Indicator::Atr)?.to_vec(),
        returns,
        volatility,
    ];

    let mut matrix = Array2::<f64>::zeros((rows, NUM_FEATURES));
    for (j, column) in columns.iter().enumerate() {
        for (i, &v) in column.iter().enumerate() {
            matrix[[i, j]] = v;
        }
    }
    Ok(matrix)
}

/// Forward percentage-change labels, `(rows, horizons)`. The last
/// `horizon` rows of each column are undefined.
pub fn label_matrix(panel: &IndicatorPanel) -> Array2<f64> {
    let closes = panel.series().closes();
    let mut labels = Array2::<f64>::zeros((closes.len(), HORIZONS.len()));
    for (j, &horizon) in HORIZONS.iter().enumerate() {
        for (i, v) in forward_pct_change(&closes, horizon).into_iter().enumerate() {
            labels[[i, j]] = v;
        }
    }
    labels
}

/// Builds scaled training and validation windows from `panel`.
///
/// Rows with any undefined feature or label are dropped, the scaler is fitted
/// on what remains, and each window of `look_back` rows is paired with the
/// label row right after it. Pairs are split 80/20 in time order.
pub fn build_sequences(panel: &IndicatorPanel, look_back: usize) -> AnalysisResult<SequenceDataset> {
    let rows = panel.len();
    let required = look_back + MIN_TRAINING_MARGIN;
    if rows < required {
        error!(
            "Insufficient data points ({}) for sequence preparation. Need at least {}.",
            rows, required
        );
        return Err(AnalysisError::insufficient("sequence preparation", required, rows));
    }

    let features = feature_matrix(panel)?;
    let labels = label_matrix(panel);

    let keep: Vec<usize> = (0..rows)
        .filter(|&i| {
            features.row(i).iter().all(|v| v.is_finite()) && labels.row(i).iter().all(|v| v.is_finite())
        })
        .collect();
    if keep.len() < look_back {
        error!(
            "Insufficient data points ({}) after dropping undefined rows. Need at least {}.",
            keep.len(),
            look_back
        );
        return Err(AnalysisError::insufficient(
            "sequence preparation after dropping undefined rows",
            look_back,
            keep.len(),
        ));
    }

    let features = features.select(Axis(0), &keep);
    let labels = labels.select(Axis(0), &keep);

    let scaler = MinMaxScaler::fit(features.view()).ok_or_else(|| {
        AnalysisError::insufficient("scaler fitting", 1, 0)
    })?;
    let scaled = scaler.transform(features.view());

    let pairs = keep.len() - look_back;
    let n_test = (pairs as f64 * TEST_FRACTION).ceil() as usize;
    let n_train = pairs.saturating_sub(n_test);
    if n_train == 0 {
        error!("Not enough (window, label) pairs ({}) for a train/test split", pairs);
        return Err(AnalysisError::insufficient(
            "train/test split",
            look_back + 2,
            keep.len(),
        ));
    }

    let mut x = Array3::<f64>::zeros((pairs, look_back, NUM_FEATURES));
    let mut y = Array2::<f64>::zeros((pairs, HORIZONS.len()));
    for (p, i) in (look_back..keep.len()).enumerate() {
        x.slice_mut(s![p, .., ..])
            .assign(&scaled.slice(s![i - look_back..i, ..]));
        y.row_mut(p).assign(&labels.row(i));
    }

    let dataset = SequenceDataset {
        train_x: x.slice(s![..n_train, .., ..]).to_owned(),
        test_x: x.slice(s![n_train.., .., ..]).to_owned(),
        train_y: y.slice(s![..n_train, ..]).to_owned(),
        test_y: y.slice(s![n_train.., ..]).to_owned(),
        feature_names: feature_names(),
        scaler,
    };

    info!(
        "Prepared {} training sequences and {} testing sequences",
        n_train, n_test
    );
    Ok(dataset)
}

/// Builds the single inference window `(1, look_back, 20)` from the last
/// `look_back` rows of `panel`, scaled with an already-fitted scaler.
pub fn build_inference_window(
    panel: &IndicatorPanel,
    scaler: &MinMaxScaler,
    look_back: usize,
) -> AnalysisResult<Array3<f64>> {
    let rows = panel.len();
    if rows < look_back {
        error!(
            "Insufficient data for prediction. Need at least {} data points, but got {}.",
            look_back, rows
        );
        return Err(AnalysisError::insufficient("prediction", look_back, rows));
    }
    if scaler.n_features() != NUM_FEATURES {
        return Err(AnalysisError::ModelNotReady {
            reason: format!(
                "scaler was fitted on {} features, expected {}",
                scaler.n_features(),
                NUM_FEATURES
            ),
        });
    }

    let mut features = feature_matrix(panel)?;
    for mut column in features.columns_mut() {
        let mut values = column.to_vec();
        fill_gaps(&mut values);
        column.assign(&ndarray::Array1::from(values));
    }

    let tail = features.slice(s![rows - look_back.., ..]);
    if let Some(j) = (0..NUM_FEATURES).find(|&j| tail.column(j).iter().any(|v| !v.is_finite())) {
        return Err(AnalysisError::IndicatorComputation {
            indicator: FEATURE_NAMES[j].to_string(),
            reason: "feature has no defined values".to_string(),
        });
    }

    let scaled = scaler.transform(tail);
    Ok(scaled.insert_axis(Axis(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::market_data::indicator_engine::compute_indicators;
    use crate::domain::market::ohlcv::{Bar, OhlcvSeries};
    use crate::domain::ml::feature_registry::{LOOK_BACK, max_horizon};
    use chrono::{Duration, TimeZone, Utc};

    fn panel(n: usize) -> IndicatorPanel {
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 13, 30, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                let c = 200.0 + (i as f64 * 0.21).sin() * 3.0 + i as f64 * 0.02;
                Bar {
                    timestamp: start + Duration::minutes(5 * i as i64),
                    open: c - 0.1,
                    high: c + 0.4,
                    low: c - 0.4,
                    close: c,
                    volume: 50_000.0 + ((i * 37) % 11) as f64 * 1_000.0,
                }
            })
            .collect();
        compute_indicators(&OhlcvSeries::new(bars).unwrap()).unwrap()
    }

    #[test]
    fn test_pair_count_matches_truncation() {
        let len = 200;
        let dataset = build_sequences(&panel(len), LOOK_BACK).unwrap();
        let pairs = dataset.train_x.shape()[0] + dataset.test_x.shape()[0];
        let warmup = RETURN_VOLATILITY_WINDOW;
        assert_eq!(pairs, len - LOOK_BACK - max_horizon() - warmup);
        assert_eq!(dataset.train_x.shape()[1..], [LOOK_BACK, NUM_FEATURES]);
        assert_eq!(dataset.train_y.shape()[1], 3);
        assert_eq!(dataset.feature_names.len(), NUM_FEATURES);
    }

    #[test]
    fn test_split_is_chronological_80_20() {
        let dataset = build_sequences(&panel(200), LOOK_BACK).unwrap();
        // 108 pairs: ceil(21.6) = 22 held out
        assert_eq!(dataset.test_x.shape()[0], 22);
        assert_eq!(dataset.train_x.shape()[0], 86);

        // The first validation window starts one row after the last training window.
        let last_train = dataset.train_x.slice(s![85, 1.., ..]);
        let first_test = dataset.test_x.slice(s![0, ..LOOK_BACK - 1, ..]);
        assert_eq!(last_train, first_test);
    }

    #[test]
    fn test_scaled_windows_are_in_unit_range() {
        let dataset = build_sequences(&panel(180), LOOK_BACK).unwrap();
        assert!(
            dataset
                .train_x
                .iter()
                .all(|&v| (-1e-12..=1.0 + 1e-12).contains(&v))
        );
    }

    #[test]
    fn test_short_panel_is_rejected() {
        let err = build_sequences(&panel(LOOK_BACK + 19), LOOK_BACK).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { required: 80, .. }));

        // Enough rows for the first check but no pairs left after truncation.
        let len = LOOK_BACK + max_horizon() + RETURN_VOLATILITY_WINDOW;
        let err = build_sequences(&panel(len), LOOK_BACK).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn test_inference_window_uses_last_rows() {
        let p = panel(150);
        let dataset = build_sequences(&p, LOOK_BACK).unwrap();
        let window = build_inference_window(&p, &dataset.scaler, LOOK_BACK).unwrap();
        assert_eq!(window.shape(), &[1, LOOK_BACK, NUM_FEATURES]);

        let raw = feature_matrix(&p).unwrap();
        let last_close = raw[[149, 3]];
        let restored = dataset
            .scaler
            .inverse_transform(window.slice(s![0, LOOK_BACK - 1..LOOK_BACK, ..]));
        assert!((restored[[0, 3]] - last_close).abs() < 1e-9);
    }

    #[test]
    fn test_inference_window_requires_look_back_rows() {
        let p = panel(150);
        let dataset = build_sequences(&p, LOOK_BACK).unwrap();
        let short = p.tail(LOOK_BACK - 1);
        let err = build_inference_window(&short, &dataset.scaler, LOOK_BACK).unwrap_err();
        assert_eq!(err, AnalysisError::insufficient("prediction", LOOK_BACK, LOOK_BACK - 1));
    }
}
