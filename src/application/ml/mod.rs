// Feature matrix, labels and windows
pub mod feature_builder;

// Persisted network + scaler unit
pub mod model_bundle;

// Load/train/persist/predict orchestration
pub mod model_lifecycle;

// Stacked LSTM regressor
pub mod sequence_model;
