/// Number of consecutive bars fed to the sequence model as one window.
pub const LOOK_BACK: usize = 60;

/// Forecast horizons in bars, in model output order.
pub const HORIZONS: [usize; 3] = [3, 6, 12];

/// Wall-clock labels of the horizons. These assume 5-minute bars and are not
/// derived from the actual bar interval.
pub const HORIZON_LABELS: [&str; 3] = ["15min", "30min", "60min"];

/// Nominal window of the return-volatility feature.
pub const RETURN_VOLATILITY_WINDOW: usize = 20;

/// Extra rows (beyond the look-back) a training panel must have.
pub const MIN_TRAINING_MARGIN: usize = 20;

/// Ordered feature names.
/// This order defines the columns of every feature window and of the fitted
/// scaler. Any change here is a breaking change for persisted models.
pub const FEATURE_NAMES: [&str; 20] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "sma_20",
    "sma_50",
    "ema_20",
    "macd",
    "macd_signal",
    "macd_hist",
    "rsi",
    "bb_upper",
    "bb_middle",
    "bb_lower",
    "stoch_k",
    "stoch_d",
    "atr",
    "return",
    "return_volatility",
];

pub const NUM_FEATURES: usize = FEATURE_NAMES.len();

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Longest forecast horizon; also the number of tail rows without labels.
pub fn max_horizon() -> usize {
    HORIZONS.iter().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_order_is_stable() {
        assert_eq!(NUM_FEATURES, 20);
        assert_eq!(FEATURE_NAMES[0], "open");
        assert_eq!(FEATURE_NAMES[18], "return");
        assert_eq!(FEATURE_NAMES[19], "return_volatility");
    }

    #[test]
    fn test_horizons_align_with_labels() {
        assert_eq!(HORIZONS.len(), HORIZON_LABELS.len());
        assert_eq!(max_horizon(), 12);
    }
}
