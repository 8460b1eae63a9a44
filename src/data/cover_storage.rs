use crate::domain::cover::{CoverUpload, ImageKind};
use crate::domain::error::DomainError;
use crate::domain::repository::CoverStorage;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Stores covers as `<root>/<uuid>.<ext>`.
#[derive(Clone, Debug)]
pub struct FsCoverStorage {
    root: PathBuf,
}

impl FsCoverStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key to its file. Keys are bare file names.
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if !valid {
            return Err(DomainError::Storage(format!("Invalid cover key '{}'", key)).into());
        }
        Ok(self.root.join(key))
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> anyhow::Error {
    DomainError::Storage(format!("Failed to {} {}: {}", action, path.display(), err)).into()
}

#[async_trait]
impl CoverStorage for FsCoverStorage {
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    async fn store(&self, upload: &CoverUpload, kind: ImageKind) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| storage_error("create cover directory", &self.root, e))?;

        let key = format!("{}.{}", Uuid::new_v4(), kind.extension());
        let final_path = self.root.join(&key);
        let part_path = self.root.join(format!("{}.part", key));

        // Write aside and rename so readers never see a half-written file.
        if let Err(e) = tokio::fs::write(&part_path, &upload.bytes).await {
            discard(&part_path).await;
            return Err(storage_error("write cover", &part_path, e));
        }
        if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
            discard(&part_path).await;
            return Err(storage_error("move cover into place at", &final_path, e));
        }

        debug!(key = %key, "Cover stored");
        Ok(key)
    }

    #[instrument(skip(self))]
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| storage_error("read cover", &path, e))
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = key, "Cover removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove cover", &path, e)),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        match self.resolve(key) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to discard partial cover");
        }
    }
}
