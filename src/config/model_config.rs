//! Forecaster training and storage configuration from environment variables.

use super::{parse_or, var_or};
use crate::application::ml::sequence_model::ModelConfig;
use anyhow::Result;
use std::path::PathBuf;

/// Model environment configuration
#[derive(Debug, Clone)]
pub struct ModelEnvConfig {
    pub model_dir: PathBuf,
    pub model_key: String,
    pub model: ModelConfig,
}

impl ModelEnvConfig {
    pub(crate) fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ModelConfig::default();
        let patience: usize = parse_or(lookup, "MODEL_PATIENCE", 0)?;
        let model = ModelConfig {
            look_back: parse_or(lookup, "MODEL_LOOK_BACK", defaults.look_back)?,
            epochs: parse_or(lookup, "MODEL_EPOCHS", defaults.epochs)?,
            batch_size: parse_or(lookup, "MODEL_BATCH_SIZE", defaults.batch_size)?,
            learning_rate: parse_or(lookup, "MODEL_LEARNING_RATE", defaults.learning_rate)?,
            seed: parse_or(lookup, "MODEL_SEED", defaults.seed)?,
            patience: (patience > 0).then_some(patience),
            ..defaults
        };
        model
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid model config: {}", e))?;

        Ok(Self {
            model_dir: PathBuf::from(var_or(lookup, "MODEL_DIR", "models")),
            model_key: var_or(lookup, "MODEL_KEY", "price_predictor"),
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_defaults() {
        let config = ModelEnvConfig::from_lookup(&|_: &str| None).unwrap();
        assert_eq!(config.model_dir, PathBuf::from("models"));
        assert_eq!(config.model_key, "price_predictor");
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn test_model_overrides() {
        let lookup = |k: &str| match k {
            "MODEL_EPOCHS" => Some("5".to_string()),
            "MODEL_PATIENCE" => Some("3".to_string()),
            _ => None,
        };
        let config = ModelEnvConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.model.epochs, 5);
        assert_eq!(config.model.patience, Some(3));

        let bad = |k: &str| (k == "MODEL_BATCH_SIZE").then(|| "0".to_string());
        assert!(ModelEnvConfig::from_lookup(&bad).is_err());
        let garbage = |k: &str| (k == "MODEL_SEED").then(|| "abc".to_string());
        assert!(ModelEnvConfig::from_lookup(&garbage).is_err());
    }
}
