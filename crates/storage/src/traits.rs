//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Object store abstraction for the asset key space.
///
/// Keys are `/`-separated relative paths such as
/// `inline/artist/2025/05/<uuid>-photo.jpg`. Implementations must be safe to
/// share across tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Read an object's metadata without fetching content.
    ///
    /// `content_type` is the declared type, never sniffed from the bytes:
    /// whatever was set on write (S3), or what the key's extension implies
    /// (filesystem). Callers that need the real format must decode.
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) when absent.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object, replacing any previous content at `key`.
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> StorageResult<()>;

    /// Copy an object within the store.
    async fn copy(&self, from: &str, to: &str, options: CopyOptions) -> StorageResult<()>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List every key under a prefix. Pagination is handled internally.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "s3", "filesystem").
    /// Used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug, Default)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Content type (if available).
    pub content_type: Option<String>,
    /// Cache directive (if available).
    pub cache_control: Option<String>,
    /// Last modification time (if available).
    pub last_modified: Option<time::OffsetDateTime>,
}

/// Object metadata applied on write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

impl PutOptions {
    pub fn new(content_type: impl Into<String>, cache_control: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            cache_control: Some(cache_control.into()),
        }
    }
}

/// How a copy treats the source object's metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CopyOptions {
    /// Keep whatever metadata the source carries.
    #[default]
    Preserve,
    /// Replace the destination's metadata with the given values.
    Replace(PutOptions),
}

impl CopyOptions {
    pub fn replace(content_type: impl Into<String>, cache_control: impl Into<String>) -> Self {
        CopyOptions::Replace(PutOptions::new(content_type, cache_control))
    }
}
