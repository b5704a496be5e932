//! The inbound surface used by domain services to attach images.
//!
//! One generic service covers single-image columns and ordered galleries for
//! every owner kind. The owner-specific parts are strategies: an
//! [`ImageSlot`] or [`GallerySlot`] that writes the reference, the
//! [`Preset`] to render, and the [`UsageCounter`] consulted on reclaim.

use crate::deferred::AfterCommit;
use crate::error::{AssetError, AssetResult};
use crate::guard::StagingGuard;
use crate::promotion::PromotionService;
use crate::reclaim::{OrphanReclaimer, ReclaimReport};
use crate::registrar::TmpImageRegistrar;
use crate::usage::UsageCounter;
use async_trait::async_trait;
use encore_core::{ImageId, Preset, UserId};
use encore_metadata::{
    DeferredTask, GalleryEntry, GalleryRepo, GalleryRow, GallerySite, ProfileImageRepo,
    ProfileSite, TaskError, UnitOfWork,
};
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Requested change to a single-image column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Remove,
    /// Attach the image uploaded under this staging key.
    Replace(String),
}

/// Writes a single-image reference on its owner.
#[async_trait]
pub trait ImageSlot: Send + Sync {
    async fn set(&self, conn: &mut SqliteConnection, image: Option<ImageId>) -> AssetResult<()>;
}

/// Reads and rewrites an owner's ordered gallery.
#[async_trait]
pub trait GallerySlot: Send + Sync {
    async fn current(&self, conn: &mut SqliteConnection) -> AssetResult<Vec<GalleryEntry>>;

    async fn replace(&self, conn: &mut SqliteConnection, rows: &[GalleryRow]) -> AssetResult<()>;
}

/// Profile image column of an artist, group or user.
#[derive(Clone, Copy, Debug)]
pub struct ProfileSlot {
    pub site: ProfileSite,
    pub owner_id: Uuid,
}

#[async_trait]
impl ImageSlot for ProfileSlot {
    async fn set(&self, conn: &mut SqliteConnection, image: Option<ImageId>) -> AssetResult<()> {
        conn.set_profile_image(self.site, self.owner_id, image).await?;
        Ok(())
    }
}

/// Gallery of an event or review.
#[derive(Clone, Copy, Debug)]
pub struct OwnerGallery {
    pub site: GallerySite,
    pub owner_id: Uuid,
}

#[async_trait]
impl GallerySlot for OwnerGallery {
    async fn current(&self, conn: &mut SqliteConnection) -> AssetResult<Vec<GalleryEntry>> {
        Ok(conn.gallery_images(self.site, self.owner_id).await?)
    }

    async fn replace(&self, conn: &mut SqliteConnection, rows: &[GalleryRow]) -> AssetResult<()> {
        conn.replace_gallery(self.site, self.owner_id, rows).await?;
        Ok(())
    }
}

/// One entry of a submitted gallery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GalleryItem {
    /// A staging key for a new upload, or the current key of an image
    /// already in the gallery.
    pub key: String,
    pub position: u32,
}

pub struct AttachmentService {
    guard: StagingGuard,
    registrar: TmpImageRegistrar,
    promotion: Arc<PromotionService>,
    reclaimer: Arc<OrphanReclaimer>,
    usage: Arc<dyn UsageCounter>,
}

impl AttachmentService {
    pub fn new(
        guard: StagingGuard,
        registrar: TmpImageRegistrar,
        promotion: Arc<PromotionService>,
        reclaimer: Arc<OrphanReclaimer>,
        usage: Arc<dyn UsageCounter>,
    ) -> Self {
        Self {
            guard,
            registrar,
            promotion,
            reclaimer,
            usage,
        }
    }

    /// Check the staging object and register a TMP row in `uow`.
    pub async fn create_tmp_image(
        &self,
        uow: &mut UnitOfWork,
        key: &str,
        owner: Option<UserId>,
    ) -> AssetResult<ImageId> {
        self.guard.ensure_exists(key).await?;
        self.registrar
            .create_tmp_image(uow.conn(), key, owner)
            .await
    }

    /// Promote `image_id` once `uow` commits, or right away without one.
    pub async fn commit_after_transaction(
        &self,
        uow: Option<&mut UnitOfWork>,
        image_id: ImageId,
        key: &str,
        owner: UserId,
        preset: &'static Preset,
    ) {
        let task = self.promotion.promotion_task(image_id, key, owner, preset);
        AfterCommit::run(uow, task).await;
    }

    /// Apply `change` to a single-image slot whose current image is `before`.
    /// Returns the image the slot points at afterwards.
    ///
    /// The replaced or removed image is offered to the reclaimer after commit.
    pub async fn update_single_image(
        &self,
        uow: &mut UnitOfWork,
        before: Option<ImageId>,
        change: ImageChange,
        owner: UserId,
        preset: &'static Preset,
        slot: &dyn ImageSlot,
    ) -> AssetResult<Option<ImageId>> {
        let after = match change {
            ImageChange::Keep => return Ok(before),
            ImageChange::Remove => {
                slot.set(uow.conn(), None).await?;
                None
            }
            ImageChange::Replace(key) => {
                if key.trim().is_empty() {
                    return Err(AssetError::BlankKey);
                }
                let image_id = self.create_tmp_image(uow, &key, Some(owner)).await?;
                slot.set(uow.conn(), Some(image_id)).await?;
                self.commit_after_transaction(Some(&mut *uow), image_id, &key, owner, preset)
                    .await;
                Some(image_id)
            }
        };

        if let Some(previous) = before.filter(|b| Some(*b) != after) {
            self.reclaim_after_commit(uow, vec![previous]).await;
        }
        Ok(after)
    }

    /// Replace an owner's whole gallery with `items`.
    ///
    /// Duplicate keys or positions are rejected before anything is written.
    /// Images whose key is resubmitted stay as they are, new staging keys are
    /// registered and promoted after commit, and images left out are offered
    /// to the reclaimer after commit.
    pub async fn replace_gallery(
        &self,
        uow: &mut UnitOfWork,
        slot: &dyn GallerySlot,
        items: &[GalleryItem],
        owner: UserId,
        preset: &'static Preset,
    ) -> AssetResult<Vec<GalleryRow>> {
        validate_gallery(items)?;

        let existing: HashMap<String, ImageId> = slot
            .current(uow.conn())
            .await?
            .into_iter()
            .map(|entry| (entry.object_key.clone(), entry.id()))
            .collect();

        let mut rows = Vec::with_capacity(items.len());
        let mut created = Vec::new();
        for item in items {
            let image_id = match existing.get(&item.key) {
                Some(&image_id) => image_id,
                None => {
                    let image_id = self.create_tmp_image(uow, &item.key, Some(owner)).await?;
                    created.push((image_id, item.key.as_str()));
                    image_id
                }
            };
            rows.push(GalleryRow {
                image_id,
                position: item.position,
            });
        }
        rows.sort_by_key(|row| row.position);
        slot.replace(uow.conn(), &rows).await?;

        for (image_id, key) in created {
            self.commit_after_transaction(Some(&mut *uow), image_id, key, owner, preset)
                .await;
        }

        let kept: HashSet<ImageId> = rows.iter().map(|row| row.image_id).collect();
        let mut dropped: Vec<ImageId> = existing
            .into_values()
            .filter(|id| !kept.contains(id))
            .collect();
        dropped.sort();
        if !dropped.is_empty() {
            self.reclaim_after_commit(uow, dropped).await;
        }

        Ok(rows)
    }

    /// Reclaim `ids` now, counting references with `counter`.
    pub async fn reclaim(
        &self,
        ids: &[ImageId],
        counter: &dyn UsageCounter,
    ) -> AssetResult<ReclaimReport> {
        self.reclaimer.reclaim(ids, counter).await
    }

    async fn reclaim_after_commit(&self, uow: &mut UnitOfWork, ids: Vec<ImageId>) {
        let reclaimer = Arc::clone(&self.reclaimer);
        let usage = Arc::clone(&self.usage);
        let label = format!("reclaim {} image(s)", ids.len());
        let task = DeferredTask::new(label, move || async move {
            reclaimer.reclaim(&ids, usage.as_ref()).await?;
            Ok::<(), TaskError>(())
        });
        AfterCommit::run(Some(uow), task).await;
    }
}

fn validate_gallery(items: &[GalleryItem]) -> AssetResult<()> {
    let mut keys = HashSet::new();
    let mut positions = HashSet::new();
    for item in items {
        if item.key.trim().is_empty() {
            return Err(AssetError::BlankKey);
        }
        if !keys.insert(item.key.as_str()) {
            return Err(AssetError::DuplicateKey(item.key.clone()));
        }
        if !positions.insert(item.position) {
            return Err(AssetError::DuplicatePosition(item.position));
        }
    }
    Ok(())
}
