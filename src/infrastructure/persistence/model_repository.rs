//! File-backed model repository: one JSON document per key.

use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::repositories::ModelRepository;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub struct FileModelRepository {
    dir: PathBuf,
}

impl FileModelRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> AnalysisResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(io_error(key, "key must be a plain file name"));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn io_error(key: &str, reason: impl ToString) -> AnalysisError {
    AnalysisError::ArtifactIo {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ModelRepository for FileModelRepository {
    async fn save(&self, key: &str, payload: &[u8]) -> AnalysisResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(key, format!("failed to create {:?}: {}", self.dir, e)))?;

        // Atomic write: write to temp file then rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, payload)
            .await
            .map_err(|e| io_error(key, format!("failed to write {:?}: {}", temp_path, e)))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| io_error(key, format!("failed to rename into {:?}: {}", path, e)))?;

        info!("Saved model {} to {:?}", key, path);
        Ok(())
    }

    async fn load(&self, key: &str) -> AnalysisResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, format!("failed to read {:?}: {}", path, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("marketcast-models-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let repo = FileModelRepository::new(scratch_dir());
        assert_eq!(repo.load("price_predictor").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load_leaves_no_temp_file() {
        let dir = scratch_dir();
        let repo = FileModelRepository::new(&dir);
        repo.save("price_predictor", b"{\"v\":1}").await.unwrap();
        repo.save("price_predictor", b"{\"v\":2}").await.unwrap();

        assert_eq!(
            repo.load("price_predictor").await.unwrap(),
            Some(b"{\"v\":2}".to_vec())
        );
        assert!(dir.join("price_predictor.json").exists());
        assert!(!dir.join("price_predictor.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_path_like_keys_are_rejected() {
        let repo = FileModelRepository::new(scratch_dir());
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                repo.save(key, b"x").await,
                Err(AnalysisError::ArtifactIo { .. })
            ));
        }
    }
}
