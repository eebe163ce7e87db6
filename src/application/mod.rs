// Sentiment scoring and alert heuristics
pub mod analysis;

// Indicator panel, series helpers and top movers
pub mod market_data;

// Feature building, forecaster and model lifecycle
pub mod ml;
