use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::StorageAccess;
use crate::{Result, TilerError};

/// Storage backed by a local directory, e.g. a synced copy of the managed drive
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a storage rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store path, refusing to escape the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(TilerError::Config(format!(
                "Storage path '{}' must stay inside the storage root",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageAccess for LocalStorage {
    fn storage_type(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        tracing::debug!("Reading {} from local storage", full_path.display());
        tokio::fs::read(&full_path)
            .await
            .map_err(|e| TilerError::io(full_path.display().to_string(), e))
    }

    async fn test_availability(&self) -> Result<()> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(TilerError::Config(format!(
                "Storage root not found: {}",
                self.root.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("grid.geojson"), b"{}").await.unwrap();

        let storage = LocalStorage::new(dir.path());
        assert_eq!(storage.storage_type(), "local");
        assert!(storage.test_availability().await.is_ok());
        assert_eq!(storage.fetch("/grid.geojson").await.unwrap(), b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let result = storage.fetch("../secrets.txt").await;
        assert!(matches!(result, Err(TilerError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_root() {
        let storage = LocalStorage::new("/definitely/not/a/storage/root");
        assert!(storage.test_availability().await.is_err());
        assert!(matches!(
            storage.fetch("grid.parquet").await,
            Err(TilerError::Io { .. })
        ));
    }
}
