//! In-memory model repository.
//!
//! Thread-safe via `Arc<RwLock>`; contents are lost on restart. Backs tests
//! and offline runs that should not touch the filesystem.

use crate::domain::errors::AnalysisResult;
use crate::domain::repositories::ModelRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryModelRepository {
    payloads: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryModelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.payloads.read().await.contains_key(key)
    }

    /// Stores raw bytes directly, bypassing bundle encoding.
    pub async fn insert_raw(&self, key: &str, payload: Vec<u8>) {
        self.payloads.write().await.insert(key.to_string(), payload);
    }
}

#[async_trait]
impl ModelRepository for InMemoryModelRepository {
    async fn save(&self, key: &str, payload: &[u8]) -> AnalysisResult<()> {
        self.payloads
            .write()
            .await
            .insert(key.to_string(), payload.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, key: &str) -> AnalysisResult<Option<Vec<u8>>> {
        Ok(self.payloads.read().await.get(key).cloned())
    }
}
