//! Database models mapping to the metadata schema.

use crate::error::{MetadataError, MetadataResult};
use encore_core::{ImageId, ImageStatus, UserId};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Image record. The key prefix and `status` always agree:
/// TMP rows point at `tmp/`, COMMITTED rows at `inline/` or `trash/`.
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub image_id: Uuid,
    pub object_key: String,
    pub public_url: String,
    pub status: String,
    pub owner_user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

impl ImageRow {
    /// A fresh TMP row for a staging key.
    pub fn tmp(
        image_id: ImageId,
        object_key: impl Into<String>,
        public_url: impl Into<String>,
        owner: UserId,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            image_id: *image_id.as_uuid(),
            object_key: object_key.into(),
            public_url: public_url.into(),
            status: ImageStatus::Tmp.as_str().to_string(),
            owner_user_id: *owner.as_uuid(),
            created_at,
            deleted_at: None,
        }
    }

    pub fn id(&self) -> ImageId {
        ImageId::from_uuid(self.image_id)
    }

    pub fn owner(&self) -> UserId {
        UserId::from_uuid(self.owner_user_id)
    }

    /// Parsed lifecycle status.
    pub fn status(&self) -> MetadataResult<ImageStatus> {
        self.status.parse().map_err(|_| {
            MetadataError::CorruptRow(format!(
                "image {} has unknown status {:?}",
                self.image_id, self.status
            ))
        })
    }

    pub fn set_status(&mut self, status: ImageStatus) {
        self.status = status.as_str().to_string();
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One position in an owner's gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryRow {
    pub image_id: ImageId,
    pub position: u32,
}

/// A gallery row joined with the image's current key.
#[derive(Debug, Clone, FromRow)]
pub struct GalleryEntry {
    pub image_id: Uuid,
    pub position: i64,
    pub object_key: String,
}

impl GalleryEntry {
    pub fn id(&self) -> ImageId {
        ImageId::from_uuid(self.image_id)
    }
}
