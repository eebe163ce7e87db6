// Alpha Vantage HTTP adapter
pub mod alpha_vantage;

// HTTP client construction
pub mod core;

// In-memory market-data source
pub mod mock;

// File-backed model storage
pub mod persistence;

// In-memory model storage
pub mod repositories;

pub use alpha_vantage::AlphaVantageMarketDataSource;
pub use mock::InMemoryMarketDataSource;
pub use persistence::FileModelRepository;
pub use repositories::InMemoryModelRepository;
