//! Common test utilities for metadata tests.

use encore_core::{ImageId, UserId};
use encore_metadata::{ImageRow, MetadataResult, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// A SQLite store in a temporary directory that cleans up on drop.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestMetadata {
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("test.db"), 5).await?;

        Ok(Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<SqliteStore> {
        self.store.clone()
    }
}

#[allow(dead_code)]
pub fn user() -> UserId {
    UserId::from_uuid(Uuid::new_v4())
}

#[allow(dead_code)]
pub fn tmp_row(key: &str) -> ImageRow {
    ImageRow::tmp(
        ImageId::new(),
        key,
        format!("http://cdn.test/{key}"),
        user(),
        OffsetDateTime::now_utc(),
    )
}
