//! The persisted unit of a trained forecaster: network, scaler and metadata.

use crate::application::ml::sequence_model::{LstmForecaster, ModelConfig, TrainingReport};
use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::ml::feature_registry::{HORIZON_LABELS, feature_names};
use crate::domain::ml::scaler::MinMaxScaler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub version: Uuid,
    pub model_key: String,
    pub created_at: DateTime<Utc>,
    pub config: ModelConfig,
    pub feature_names: Vec<String>,
    pub horizons: Vec<String>,
    pub report: TrainingReport,
    pub scaler: MinMaxScaler,
    pub network: LstmForecaster,
    /// Hex SHA-256 over the serialized network and scaler.
    pub checksum: String,
}

#[derive(Serialize)]
struct Payload<'a> {
    network: &'a LstmForecaster,
    scaler: &'a MinMaxScaler,
}

fn payload_checksum(
    key: &str,
    network: &LstmForecaster,
    scaler: &MinMaxScaler,
) -> AnalysisResult<String> {
    let bytes = serde_json::to_vec(&Payload { network, scaler }).map_err(|e| {
        AnalysisError::ArtifactIo {
            key: key.to_string(),
            reason: format!("failed to serialize payload: {}", e),
        }
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

impl ModelBundle {
    pub fn new(
        model_key: &str,
        scaler: MinMaxScaler,
        network: LstmForecaster,
        report: TrainingReport,
    ) -> AnalysisResult<Self> {
        let checksum = payload_checksum(model_key, &network, &scaler)?;
        Ok(Self {
            version: Uuid::new_v4(),
            model_key: model_key.to_string(),
            created_at: Utc::now(),
            config: network.config().clone(),
            feature_names: feature_names(),
            horizons: HORIZON_LABELS.iter().map(|h| h.to_string()).collect(),
            report,
            scaler,
            network,
            checksum,
        })
    }

    pub fn look_back(&self) -> usize {
        self.config.look_back
    }

    pub fn encode(&self) -> AnalysisResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| AnalysisError::ArtifactIo {
            key: self.model_key.clone(),
            reason: format!("failed to serialize bundle: {}", e),
        })
    }

    /// Parses a stored bundle and verifies its checksum and feature layout.
    pub fn decode(key: &str, bytes: &[u8]) -> AnalysisResult<Self> {
        let bundle: Self = serde_json::from_slice(bytes).map_err(|e| AnalysisError::ArtifactIo {
            key: key.to_string(),
            reason: format!("malformed bundle: {}", e),
        })?;

        let expected = payload_checksum(key, &bundle.network, &bundle.scaler)?;
        if expected != bundle.checksum {
            return Err(AnalysisError::ArtifactIo {
                key: key.to_string(),
                reason: format!(
                    "checksum mismatch: stored {}, computed {}",
                    bundle.checksum, expected
                ),
            });
        }
        if bundle.feature_names != feature_names()
            || bundle.scaler.n_features() != bundle.network.n_features()
        {
            return Err(AnalysisError::ArtifactIo {
                key: key.to_string(),
                reason: "feature layout does not match this build".to_string(),
            });
        }
        Ok(bundle)
    }
}
