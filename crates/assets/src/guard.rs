//! Staging existence check.

use crate::error::{AssetError, AssetResult};
use encore_storage::ObjectStore;
use std::sync::Arc;

/// Confirms a client-supplied staging key still exists before it is trusted.
///
/// A staging object is consumed (moved) by promotion, so a missing object is
/// how a second use of the same key shows up.
#[derive(Clone)]
pub struct StagingGuard {
    store: Arc<dyn ObjectStore>,
}

impl StagingGuard {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// No-op for a blank key; deciding what blank means is up to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_exists(&self, key: &str) -> AssetResult<()> {
        if key.trim().is_empty() {
            return Ok(());
        }
        let exists = self
            .store
            .exists(key)
            .await
            .map_err(|e| AssetError::storage_op("exists", key, e))?;
        if exists {
            Ok(())
        } else {
            tracing::debug!(key, "staging object missing");
            Err(AssetError::StagingObjectNotFound(key.to_string()))
        }
    }
}
