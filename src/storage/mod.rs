//! Object storage boundary for finished recordings.
//!
//! The engine only needs two primitives: upload a local file under a key and
//! mint a retrieval URL. [`FsBucket`] backs small deployments with a plain
//! directory tree; tests use an in-memory implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a local file under the given key. Returning `Ok` means the
    /// object is durably stored; callers may only delete the local artifact
    /// after that.
    async fn upload(&self, local: &Path, key: &str) -> Result<()>;

    /// Produce a retrieval URL for a stored key, valid for at least `ttl`.
    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String>;
}

/// Filesystem-backed bucket: objects are copied under a root directory and
/// addressed with `file://` URLs. The TTL is accepted for interface parity
/// but local URLs do not expire.
pub struct FsBucket {
    root: PathBuf,
}

impl FsBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStorage for FsBucket {
    async fn upload(&self, local: &Path, key: &str) -> Result<()> {
        let dest = self.object_path(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create bucket path {}", parent.display()))?;
        }
        tokio::fs::copy(local, &dest)
            .await
            .with_context(|| format!("failed to upload {} to {}", local.display(), dest.display()))?;
        info!(key, "uploaded recording to bucket");
        Ok(())
    }

    async fn presigned_url(&self, key: &str, _ttl: Duration) -> Result<String> {
        let path = self.object_path(key);
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_bucket_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = FsBucket::new(dir.path().join("bucket"));

        let src = dir.path().join("rec.mp4");
        std::fs::write(&src, b"audio bytes").unwrap();

        bucket.upload(&src, "2026/08/29/call-1.mp4").await.unwrap();
        let url = bucket
            .presigned_url("2026/08/29/call-1.mp4", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(dir.path().join("bucket/2026/08/29/call-1.mp4").exists());
    }
}
