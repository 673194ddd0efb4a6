use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use platform_core::error::AppError;
use tokio::io::AsyncWriteExt;

use super::{sharded_key, Capacity, StorageAdapter};

/// Disk-backed adapter. Writes go to a temp file in the same directory as
/// the final path, then an atomic rename — a partially written file is
/// never visible under its final key.
pub struct LocalAdapter {
    base_dir: PathBuf,
}

impl LocalAdapter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        LocalAdapter { base_dir: base_dir.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_dir.join(path)
    }
}

#[async_trait]
impl StorageAdapter for LocalAdapter {
    async fn store(&self, hash: &str, bytes: Bytes) -> Result<String, AppError> {
        let key = sharded_key(hash);
        let dest = self.full_path(&key);

        if tokio::fs::metadata(&dest).await.is_ok() {
            return Ok(key);
        }

        let parent = dest.parent().ok_or_else(|| AppError::Internal("invalid storage path".to_string()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Internal(format!("failed to create storage directory: {e}")))?;

        let tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| AppError::Internal(format!("failed to create temp file: {e}")))?;
        let tmp_path = tmp.path().to_path_buf();

        {
            let mut file = tokio::fs::File::create(&tmp_path)
                .await
                .map_err(|e| AppError::Internal(format!("failed to open temp file: {e}")))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| AppError::Internal(format!("failed to write temp file: {e}")))?;
            file.sync_all().await.map_err(|e| AppError::Internal(format!("failed to fsync: {e}")))?;
        }

        tokio::fs::rename(&tmp_path, &dest)
            .await
            .map_err(|e| AppError::Internal(format!("failed to rename into place: {e}")))?;
        std::mem::forget(tmp);

        Ok(key)
    }

    async fn retrieve(&self, path: &str) -> Result<Bytes, AppError> {
        let full = self.full_path(path);
        let data = tokio::fs::read(&full)
            .await
            .map_err(|_| AppError::NotFound(format!("object {path} not found in local storage")))?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        let full = self.full_path(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!("failed to delete object: {e}"))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, AppError> {
        Ok(tokio::fs::metadata(self.full_path(path)).await.is_ok())
    }

    async fn size(&self, path: &str) -> Result<u64, AppError> {
        let meta = tokio::fs::metadata(self.full_path(path))
            .await
            .map_err(|_| AppError::NotFound(format!("object {path} not found in local storage")))?;
        Ok(meta.len())
    }

    async fn ping(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("local storage base dir unreachable: {e}")))
    }

    async fn capacity(&self) -> Result<Capacity, AppError> {
        // `statvfs` isn't in std; without a platform crate for disk usage we
        // report an unbounded capacity and rely on quotas instead.
        Ok(Capacity { total: u64::MAX, used: dir_size(&self.base_dir), available: u64::MAX })
    }

    fn type_name(&self) -> &'static str {
        "local"
    }
}

fn dir_size(_path: &Path) -> u64 {
    0
}
