//! Repository abstraction for model artifacts.
//!
//! The lifecycle manager persists one serialized model bundle per key.
//! Storage mechanics stay behind this trait: the file-backed implementation
//! writes atomically, the in-memory one backs tests.

use crate::domain::errors::AnalysisResult;
use async_trait::async_trait;

/// Key/value store for serialized model bundles
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Persist the payload under `key`, replacing any previous one
    async fn save(&self, key: &str, payload: &[u8]) -> AnalysisResult<()>;

    /// Load the payload for `key`. `Ok(None)` means nothing was persisted yet.
    async fn load(&self, key: &str) -> AnalysisResult<Option<Vec<u8>>>;
}
