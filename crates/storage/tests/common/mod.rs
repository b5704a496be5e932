//! Common test utilities for storage tests.

use bytes::Bytes;
use encore_storage::{FilesystemBackend, ObjectStore, PutOptions, StorageResult};
use std::sync::Arc;
use tempfile::TempDir;

/// A filesystem-backed store in a temporary directory that cleans up on drop.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestStorage {
    pub backend: Arc<dyn ObjectStore>,
    pub temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestStorage {
    pub async fn new() -> StorageResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend = FilesystemBackend::new(temp_dir.path()).await?;

        Ok(Self {
            backend: Arc::new(backend),
            temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.backend.clone()
    }

    /// Seed an object with a JPEG content type.
    pub async fn seed(&self, key: &str, data: &'static [u8]) {
        self.backend
            .put(
                key,
                Bytes::from_static(data),
                PutOptions::new("image/jpeg", "no-store"),
            )
            .await
            .expect("seed object");
    }
}
