//! Soft-deletion of images nothing references any more.

use crate::error::{AssetError, AssetResult};
use crate::metrics::IMAGES_RECLAIMED;
use crate::usage::UsageCounter;
use encore_core::keys::{derivative_prefix, trash_key};
use encore_core::{ImageId, ImageStatus, PublicUrlBuilder};
use encore_metadata::{ImageRepo, ImageRow, SqliteStore};
use encore_storage::{CopyOptions, ObjectStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;

/// Per-id outcome of a reclaim run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    pub reclaimed: Vec<ImageId>,
    /// Still referenced somewhere; left untouched.
    pub retained: Vec<ImageId>,
    pub missing: Vec<ImageId>,
    pub already_deleted: Vec<ImageId>,
}

/// Moves orphaned originals and their derivatives under `trash/` and stamps
/// the row's deletion time.
///
/// Counting is not locked against concurrent attaches: two requests that
/// both see zero references can both reclaim.
pub struct OrphanReclaimer {
    store: Arc<dyn ObjectStore>,
    metadata: Arc<SqliteStore>,
    urls: PublicUrlBuilder,
}

impl OrphanReclaimer {
    pub fn new(store: Arc<dyn ObjectStore>, metadata: Arc<SqliteStore>, urls: PublicUrlBuilder) -> Self {
        Self {
            store,
            metadata,
            urls,
        }
    }

    #[tracing::instrument(skip_all, fields(candidates = ids.len()))]
    pub async fn reclaim(
        &self,
        ids: &[ImageId],
        counter: &dyn UsageCounter,
    ) -> AssetResult<ReclaimReport> {
        let mut report = ReclaimReport::default();
        let mut seen = HashSet::new();

        for &image_id in ids {
            if !seen.insert(image_id) {
                continue;
            }

            let row = {
                let mut conn = self.metadata.acquire().await?;
                conn.find_image(image_id).await?
            };
            let Some(row) = row else {
                report.missing.push(image_id);
                continue;
            };
            if row.is_deleted() {
                report.already_deleted.push(image_id);
                continue;
            }

            let usages = counter.count_usages(image_id).await?;
            if usages > 0 {
                tracing::debug!(%image_id, usages, "image still referenced");
                report.retained.push(image_id);
                continue;
            }

            self.soft_delete(row).await?;
            IMAGES_RECLAIMED.inc();
            report.reclaimed.push(image_id);
        }

        tracing::info!(
            reclaimed = report.reclaimed.len(),
            retained = report.retained.len(),
            "reclaim finished"
        );
        Ok(report)
    }

    async fn soft_delete(&self, mut row: ImageRow) -> AssetResult<()> {
        let image_id = row.id();
        if row.status()? == ImageStatus::Committed {
            let original = row.object_key.clone();
            let derivatives = self
                .store
                .list(&derivative_prefix(&original))
                .await
                .map_err(|e| AssetError::storage_op("list", &original, e))?;
            for key in &derivatives {
                self.move_to_trash(key).await?;
            }
            if !self.move_to_trash(&original).await? {
                tracing::warn!(%image_id, key = %original, "original already gone from its location");
            }

            let trashed = trash_key(&original);
            row.public_url = self.urls.url_for(&trashed);
            row.object_key = trashed;
            tracing::info!(%image_id, key = %row.object_key, derivatives = derivatives.len(), "image moved to trash");
        } else {
            tracing::info!(%image_id, key = %row.object_key, "orphaned tmp image marked deleted");
        }

        row.deleted_at = Some(OffsetDateTime::now_utc());
        let mut conn = self.metadata.acquire().await?;
        conn.save_image(&row).await?;
        Ok(())
    }

    /// Copy then delete. Returns false when the source did not exist.
    async fn move_to_trash(&self, key: &str) -> AssetResult<bool> {
        let destination = trash_key(key);
        if destination == key {
            return Ok(true);
        }
        match self
            .store
            .copy(key, &destination, CopyOptions::Preserve)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(AssetError::storage_op("copy", key, e)),
        }
        match self.store.delete(key).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(AssetError::storage_op("delete", key, e)),
        }
    }
}
