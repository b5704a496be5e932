//! Staging to permanent promotion.

use crate::error::{AssetError, AssetResult};
use crate::metrics::{IMAGES_PROMOTED, PROMOTION_FAILURES};
use crate::variants::{GeneratedVariant, VariantEngine};
use crate::waiter::{ExistenceWaiter, Visibility};
use encore_core::config::AssetConfig;
use encore_core::keys::{is_staging_key, promoted_key};
use encore_core::{ImageId, ImageStatus, Preset, PublicUrlBuilder, UserId};
use encore_metadata::{DeferredTask, ImageRepo, ImageRow, SqliteStore, TaskError};
use encore_storage::{CopyOptions, ObjectStore};
use serde::Serialize;
use std::sync::Arc;

/// What a promotion did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromotionOutcome {
    Promoted {
        image_id: ImageId,
        key: String,
        public_url: String,
        variants: VariantOutcome,
    },
    /// The row was already COMMITTED. The transition happens once.
    AlreadyCommitted { image_id: ImageId, key: String },
    /// The row was soft-deleted before promotion ran.
    Deleted { image_id: ImageId },
}

/// What happened to the derivatives of a freshly promoted original.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantOutcome {
    Generated(Vec<GeneratedVariant>),
    /// The original never became visible, so no derivative was attempted.
    Skipped { attempts: u32 },
    Failed(String),
}

enum Moved {
    Promoted { key: String, public_url: String },
    Skipped(PromotionOutcome),
}

/// Validates a staging object, moves it under `inline/`, commits the row and
/// generates derivatives.
pub struct PromotionService {
    store: Arc<dyn ObjectStore>,
    metadata: Arc<SqliteStore>,
    urls: PublicUrlBuilder,
    config: AssetConfig,
    waiter: ExistenceWaiter,
    engine: VariantEngine,
}

impl PromotionService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        metadata: Arc<SqliteStore>,
        config: AssetConfig,
        waiter: ExistenceWaiter,
        engine: VariantEngine,
    ) -> Self {
        Self {
            urls: PublicUrlBuilder::new(config.public_base_url.as_str()),
            store,
            metadata,
            config,
            waiter,
            engine,
        }
    }

    /// Deferred entry point. Failures are logged with the image id and key
    /// and counted, never returned.
    pub async fn promote(
        &self,
        image_id: ImageId,
        staging_key: &str,
        owner: UserId,
        preset: &'static Preset,
    ) -> Option<PromotionOutcome> {
        match self.promote_now(image_id, staging_key, owner, preset).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(
                    %image_id,
                    key = staging_key,
                    class = ?e.class(),
                    error = %e,
                    "promotion failed"
                );
                None
            }
        }
    }

    /// Promote outside any caller transaction and surface every failure up
    /// to the row commit. Derivative failures after the commit are reported in the
    /// outcome, not as an error.
    #[tracing::instrument(skip(self, preset), fields(preset = preset.name))]
    pub async fn promote_now(
        &self,
        image_id: ImageId,
        staging_key: &str,
        owner: UserId,
        preset: &'static Preset,
    ) -> AssetResult<PromotionOutcome> {
        let moved = self
            .move_and_commit(image_id, staging_key, owner)
            .await
            .inspect_err(|_| PROMOTION_FAILURES.inc())?;

        let (key, public_url) = match moved {
            Moved::Skipped(outcome) => return Ok(outcome),
            Moved::Promoted { key, public_url } => (key, public_url),
        };
        IMAGES_PROMOTED.inc();
        tracing::info!(%image_id, key = %key, "image promoted");

        let variants = self.generate_variants(image_id, &key, preset).await;
        Ok(PromotionOutcome::Promoted {
            image_id,
            key,
            public_url,
            variants,
        })
    }

    /// Wrap [`promote`](Self::promote) as an after-commit task.
    pub fn promotion_task(
        self: &Arc<Self>,
        image_id: ImageId,
        staging_key: &str,
        owner: UserId,
        preset: &'static Preset,
    ) -> DeferredTask {
        let service = Arc::clone(self);
        let key = staging_key.to_string();
        DeferredTask::new(format!("promote {image_id} ({key})"), move || async move {
            service.promote(image_id, &key, owner, preset).await;
            Ok::<(), TaskError>(())
        })
    }

    /// Copy to the inline key, commit the row, then delete the staging source.
    ///
    /// No transaction is held across storage calls. Until the row commits the
    /// staging object is untouched, so a failure leaves a TMP row that still
    /// points at an existing object and the promotion can be retried.
    async fn move_and_commit(
        &self,
        image_id: ImageId,
        staging_key: &str,
        owner: UserId,
    ) -> AssetResult<Moved> {
        if !is_staging_key(staging_key) {
            return Err(AssetError::InvalidKey(format!(
                "not a staging key: '{staging_key}'"
            )));
        }

        let row = self.load_image(image_id).await?;
        if let Some(outcome) = settled(&row)? {
            return Ok(Moved::Skipped(outcome));
        }
        if row.object_key != staging_key {
            return Err(AssetError::InvalidKey(format!(
                "image {image_id} is registered for '{}', not '{staging_key}'",
                row.object_key
            )));
        }
        if row.owner() != owner {
            tracing::warn!(%image_id, row_owner = %row.owner(), %owner, "promotion owner differs from row owner");
        }

        let content_type = self.validate_object(staging_key).await?;
        let destination = promoted_key(staging_key)?;
        self.store
            .copy(
                staging_key,
                &destination,
                CopyOptions::replace(content_type, self.config.cache_control.as_str()),
            )
            .await
            .map_err(|e| AssetError::storage_op("copy", staging_key, e))?;

        let public_url = self.urls.url_for(&destination);
        let committed = {
            let mut conn = self.metadata.acquire().await?;
            conn.commit_promotion(image_id, staging_key, &destination, &public_url)
                .await
        };
        match committed {
            Ok(true) => {}
            Ok(false) => return self.lost_race(image_id, &destination).await,
            Err(e) => {
                // The copy may be overwritten by a retry; the row still names the staging key.
                tracing::warn!(%image_id, key = %destination, error = %e, "row not committed, copy left in place");
                return Err(e.into());
            }
        }

        match self.store.delete(staging_key).await {
            Err(e) if !e.is_not_found() => {
                tracing::warn!(%image_id, key = staging_key, error = %e, "staging object left behind after promotion");
            }
            _ => {}
        }

        Ok(Moved::Promoted {
            key: destination,
            public_url,
        })
    }

    async fn load_image(&self, image_id: ImageId) -> AssetResult<ImageRow> {
        let mut conn = self.metadata.acquire().await?;
        conn.find_image(image_id)
            .await?
            .ok_or(AssetError::ImageNotFound(image_id))
    }

    /// The row changed between the read and the commit.
    async fn lost_race(&self, image_id: ImageId, destination: &str) -> AssetResult<Moved> {
        let row = self.load_image(image_id).await?;
        match settled(&row)? {
            Some(outcome @ PromotionOutcome::AlreadyCommitted { .. }) => Ok(Moved::Skipped(outcome)),
            Some(outcome) => {
                if let Err(e) = self.store.delete(destination).await {
                    tracing::warn!(%image_id, key = destination, error = %e, "failed to discard copy of deleted image");
                }
                Ok(Moved::Skipped(outcome))
            }
            None => Err(AssetError::Internal(format!(
                "image {image_id} changed during promotion"
            ))),
        }
    }

    /// Size and declared content-type checks. Nothing has been mutated when
    /// this fails. The bytes are not inspected here; a mislabelled object
    /// passes and is caught by the decoder during variant generation.
    async fn validate_object(&self, key: &str) -> AssetResult<String> {
        let meta = self.store.head(key).await.map_err(|e| {
            if e.is_not_found() {
                AssetError::StagingObjectNotFound(key.to_string())
            } else {
                AssetError::storage_op("head", key, e)
            }
        })?;

        if meta.size == 0 {
            return Err(AssetError::EmptyObject(key.to_string()));
        }
        if meta.size > self.config.max_object_bytes {
            return Err(AssetError::ObjectTooLarge {
                key: key.to_string(),
                size: meta.size,
                max: self.config.max_object_bytes,
            });
        }
        match meta.content_type {
            Some(ct) if self.config.is_allowed_content_type(&ct) => Ok(ct),
            content_type => Err(AssetError::UnsupportedContentType {
                key: key.to_string(),
                content_type,
            }),
        }
    }

    async fn generate_variants(
        &self,
        image_id: ImageId,
        key: &str,
        preset: &'static Preset,
    ) -> VariantOutcome {
        if let Visibility::GaveUp { attempts } = self.waiter.wait_until_exists(key).await {
            tracing::warn!(%image_id, key, attempts, "skipping variant generation");
            return VariantOutcome::Skipped { attempts };
        }
        match self.engine.generate(key, preset).await {
            Ok(generated) => VariantOutcome::Generated(generated),
            Err(e) => {
                tracing::error!(%image_id, key, error = %e, "derivatives not generated");
                VariantOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Outcome for a row that promotion must not touch: soft-deleted or already COMMITTED.
fn settled(row: &ImageRow) -> AssetResult<Option<PromotionOutcome>> {
    let image_id = row.id();
    if row.is_deleted() {
        tracing::warn!(%image_id, "image deleted before promotion, skipping");
        return Ok(Some(PromotionOutcome::Deleted { image_id }));
    }
    if row.status()? == ImageStatus::Committed {
        tracing::debug!(%image_id, key = %row.object_key, "image already committed");
        return Ok(Some(PromotionOutcome::AlreadyCommitted {
            image_id,
            key: row.object_key.clone(),
        }));
    }
    Ok(None)
}
