//! Model lifecycle: load, train, persist and serve one forecaster bundle.
//!
//! The held bundle sits behind a `std::sync::RwLock<Option<Arc<_>>>` so
//! predictions clone the `Arc` and never wait on training. State transitions
//! that train are serialized by a `tokio::sync::Mutex`; the slot is
//! re-checked after acquiring it so concurrent first requests train once.

use crate::application::market_data::indicator_engine::compute_indicators;
use crate::application::ml::feature_builder::{build_inference_window, build_sequences};
use crate::application::ml::model_bundle::ModelBundle;
use crate::application::ml::sequence_model::{LstmForecaster, ModelConfig};
use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::market::ohlcv::OhlcvSeries;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::MarketDataSource;
use crate::domain::repositories::ModelRepository;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Uninitialized,
    Loaded,
    Training,
    Ready,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loaded => "loaded",
            Self::Training => "training",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Where training data comes from and how the bundle is keyed.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub model_key: String,
    pub symbol: String,
    pub interval: Timeframe,
    pub history_days: i64,
    pub model: ModelConfig,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            model_key: "price_predictor".to_string(),
            symbol: "SPY".to_string(),
            interval: Timeframe::FiveMin,
            history_days: 60,
            model: ModelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonForecast {
    pub horizon: String,
    /// Forecast fractional change from the last close
    pub change: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub model_version: Uuid,
    pub last_close: f64,
    pub horizons: Vec<HorizonForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub state: LifecycleState,
    pub model_loaded: bool,
    pub model_version: Option<Uuid>,
    pub trained_at: Option<DateTime<Utc>>,
}

/// Trains a bundle from a series. CPU-bound; callers on the async runtime
/// run it on a blocking worker.
pub fn train_bundle(
    series: &OhlcvSeries,
    model_key: &str,
    config: &ModelConfig,
) -> AnalysisResult<ModelBundle> {
    config.validate()?;
    let panel = compute_indicators(series)?;
    let dataset = build_sequences(&panel, config.look_back)?;
    info!(
        "Training on {} sequences ({} held out for validation)",
        dataset.train_x.shape()[0],
        dataset.test_x.shape()[0]
    );
    let mut network = LstmForecaster::with_defaults(config.clone());
    let report = network.fit(
        dataset.train_x.view(),
        dataset.train_y.view(),
        dataset.test_x.view(),
        dataset.test_y.view(),
    )?;
    ModelBundle::new(model_key, dataset.scaler, network, report)
}

/// Forecast prices for each horizon from the last `look_back` bars.
pub fn forecast_with(bundle: &ModelBundle, series: &OhlcvSeries) -> AnalysisResult<Forecast> {
    let look_back = bundle.look_back();
    if series.len() < look_back {
        error!(
            "Insufficient data for prediction. Need at least {} data points, but got {}.",
            look_back,
            series.len()
        );
        return Err(AnalysisError::insufficient("prediction", look_back, series.len()));
    }
    let last_close = match series.last() {
        Some(bar) => bar.close,
        None => return Err(AnalysisError::insufficient("prediction", look_back, 0)),
    };

    let panel = compute_indicators(series)?;
    let window = build_inference_window(&panel, &bundle.scaler, look_back)?;
    let output = bundle.network.predict(window.view())?;

    let horizons = bundle
        .horizons
        .iter()
        .zip(output.row(0).iter())
        .map(|(label, &change)| HorizonForecast {
            horizon: label.clone(),
            change,
            price: last_close * (1.0 + change),
        })
        .collect();

    Ok(Forecast {
        model_version: bundle.version,
        last_close,
        horizons,
    })
}

pub struct ModelLifecycleManager {
    store: Arc<dyn ModelRepository>,
    market_data: Arc<dyn MarketDataSource>,
    settings: LifecycleSettings,
    bundle: RwLock<Option<Arc<ModelBundle>>>,
    state: RwLock<LifecycleState>,
    training: Mutex<()>,
}

impl ModelLifecycleManager {
    /// Creates the manager and attempts to load the stored bundle. A missing
    /// or unreadable bundle leaves the manager uninitialized.
    pub async fn initialize(
        store: Arc<dyn ModelRepository>,
        market_data: Arc<dyn MarketDataSource>,
        settings: LifecycleSettings,
    ) -> Self {
        let key = settings.model_key.clone();
        let loaded = match store.load(&key).await {
            Ok(Some(bytes)) => match ModelBundle::decode(&key, &bytes) {
                Ok(bundle) => {
                    info!(
                        "Loaded model {} (version {}, trained {})",
                        key, bundle.version, bundle.created_at
                    );
                    Some(Arc::new(bundle))
                }
                Err(e) => {
                    warn!("Failed to load model {}: {}", key, e);
                    None
                }
            },
            Ok(None) => {
                info!("No saved model found for {}. Model will be trained on first request.", key);
                None
            }
            Err(e) => {
                warn!("Failed to load model {}: {}", key, e);
                None
            }
        };

        let state = if loaded.is_some() {
            LifecycleState::Loaded
        } else {
            LifecycleState::Uninitialized
        };

        Self {
            store,
            market_data,
            settings,
            bundle: RwLock::new(loaded),
            state: RwLock::new(state),
            training: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    pub fn current(&self) -> Option<Arc<ModelBundle>> {
        self.bundle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn install(&self, bundle: Arc<ModelBundle>) {
        *self.bundle.write().unwrap_or_else(PoisonError::into_inner) = Some(bundle);
    }

    pub fn status(&self) -> ModelStatus {
        let bundle = self.current();
        ModelStatus {
            state: self.state(),
            model_loaded: bundle.is_some(),
            model_version: bundle.as_ref().map(|b| b.version),
            trained_at: bundle.as_ref().map(|b| b.created_at),
        }
    }

    /// Forecasts from `series`, training first if no bundle is held.
    pub async fn predict(&self, series: &OhlcvSeries) -> AnalysisResult<Forecast> {
        let required = self
            .current()
            .map(|b| b.look_back())
            .unwrap_or(self.settings.model.look_back);
        if series.len() < required {
            error!(
                "Insufficient data for prediction. Need at least {} data points, but got {}.",
                required,
                series.len()
            );
            return Err(AnalysisError::insufficient("prediction", required, series.len()));
        }

        let bundle = self.ensure_ready().await?;
        let forecast = forecast_with(&bundle, series)?;
        info!(
            "Prediction made with model {} from {} bars",
            forecast.model_version,
            series.len()
        );
        Ok(forecast)
    }

    async fn ensure_ready(&self) -> AnalysisResult<Arc<ModelBundle>> {
        if let Some(bundle) = self.current() {
            return Ok(bundle);
        }
        let _guard = self.training.lock().await;
        if let Some(bundle) = self.current() {
            return Ok(bundle);
        }
        info!("No model available, training new model...");
        self.train_locked(None)
            .await
            .map_err(|e| AnalysisError::ModelNotReady {
                reason: format!("no stored model and training failed: {}", e),
            })
    }

    /// Retrains from the configured market-data source and replaces the
    /// held bundle.
    pub async fn train(&self) -> AnalysisResult<Arc<ModelBundle>> {
        let _guard = self.training.lock().await;
        self.train_locked(None).await
    }

    /// Retrains from caller-supplied bars instead of fetching.
    pub async fn train_on(&self, series: OhlcvSeries) -> AnalysisResult<Arc<ModelBundle>> {
        let _guard = self.training.lock().await;
        self.train_locked(Some(series)).await
    }

    async fn train_locked(&self, series: Option<OhlcvSeries>) -> AnalysisResult<Arc<ModelBundle>> {
        self.set_state(LifecycleState::Training);
        match self.run_training(series).await {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                self.install(Arc::clone(&bundle));
                self.set_state(LifecycleState::Ready);
                info!(
                    "Model {} trained and saved (version {})",
                    self.settings.model_key, bundle.version
                );
                Ok(bundle)
            }
            Err(e) => {
                self.set_state(LifecycleState::Failed);
                error!("Error training model: {}", e);
                Err(e)
            }
        }
    }

    async fn run_training(&self, series: Option<OhlcvSeries>) -> AnalysisResult<ModelBundle> {
        let series = match series {
            Some(series) => series,
            None => self.fetch_training_series().await?,
        };

        let key = self.settings.model_key.clone();
        let config = self.settings.model.clone();
        let bundle = tokio::task::spawn_blocking(move || train_bundle(&series, &key, &config))
            .await
            .map_err(|e| AnalysisError::Training {
                reason: format!("training task failed: {}", e),
            })??;

        let payload = bundle.encode()?;
        self.store.save(&bundle.model_key, &payload).await?;
        Ok(bundle)
    }

    async fn fetch_training_series(&self) -> AnalysisResult<OhlcvSeries> {
        let settings = &self.settings;
        if !settings.interval.matches_horizon_labels() {
            warn!(
                "Horizon labels assume 5-minute bars; training on {}-minute bars",
                settings.interval.to_minutes()
            );
        }
        let end = Utc::now();
        let start = end - Duration::days(settings.history_days);
        info!(
            "Fetching {} days of {} {} bars for training",
            settings.history_days, settings.symbol, settings.interval
        );
        let series = self
            .market_data
            .fetch_ohlcv(&settings.symbol, settings.interval, start, end)
            .await?;
        Ok(series)
    }
}
