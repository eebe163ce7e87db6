// Indicator panel derived from OHLCV data
pub mod indicator_panel;

// Raw OHLCV series
pub mod ohlcv;

// Quote snapshots and movers
pub mod quote;

pub mod timeframe;
