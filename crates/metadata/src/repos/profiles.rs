//! Single-reference profile image columns.

use super::ProfileSite;
use crate::error::MetadataResult;
use async_trait::async_trait;
use encore_core::ImageId;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[async_trait]
pub trait ProfileImageRepo: Send {
    /// Current profile image of an owner. `None` when the owner has no image or no row.
    async fn profile_image(
        &mut self,
        site: ProfileSite,
        owner_id: Uuid,
    ) -> MetadataResult<Option<ImageId>>;

    /// Point an owner's profile column at `image_id`, creating the owner row if needed.
    async fn set_profile_image(
        &mut self,
        site: ProfileSite,
        owner_id: Uuid,
        image_id: Option<ImageId>,
    ) -> MetadataResult<()>;
}

#[async_trait]
impl ProfileImageRepo for SqliteConnection {
    async fn profile_image(
        &mut self,
        site: ProfileSite,
        owner_id: Uuid,
    ) -> MetadataResult<Option<ImageId>> {
        let sql = format!(
            "SELECT profile_image_id FROM {} WHERE {} = ?",
            site.table(),
            site.owner_column()
        );
        let image: Option<Option<Uuid>> = sqlx::query_scalar(&sql)
            .bind(owner_id)
            .fetch_optional(&mut *self)
            .await?;
        Ok(image.flatten().map(ImageId::from_uuid))
    }

    async fn set_profile_image(
        &mut self,
        site: ProfileSite,
        owner_id: Uuid,
        image_id: Option<ImageId>,
    ) -> MetadataResult<()> {
        let sql = format!(
            "INSERT INTO {table} ({owner}, profile_image_id) VALUES (?, ?) \
             ON CONFLICT({owner}) DO UPDATE SET profile_image_id = excluded.profile_image_id",
            table = site.table(),
            owner = site.owner_column()
        );
        sqlx::query(&sql)
            .bind(owner_id)
            .bind(image_id.map(|id| *id.as_uuid()))
            .execute(&mut *self)
            .await?;
        Ok(())
    }
}
