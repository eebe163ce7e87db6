// OHLCV to indicator panel
pub mod indicator_engine;

// Column helpers shared by indicators, features and alerts
pub mod series;

// Quote snapshot ranking
pub mod top_movers;
