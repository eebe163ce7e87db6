// Market data domain: OHLCV series, indicator panel, quotes
pub mod market;

// Model-facing definitions: feature layout, scaler
pub mod ml;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Sentiment categories and reports
pub mod sentiment;

// Domain-specific error types
pub mod errors;
