//! Ordered gallery mapping rows.

use super::GallerySite;
use crate::error::{MetadataError, MetadataResult};
use crate::models::{GalleryEntry, GalleryRow};
use async_trait::async_trait;
use encore_core::ImageId;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[async_trait]
pub trait GalleryRepo: Send {
    /// Gallery rows of an owner ordered by position, with each image's current key.
    async fn gallery_images(
        &mut self,
        site: GallerySite,
        owner_id: Uuid,
    ) -> MetadataResult<Vec<GalleryEntry>>;

    /// Replace every mapping row of an owner with `rows`.
    async fn replace_gallery(
        &mut self,
        site: GallerySite,
        owner_id: Uuid,
        rows: &[GalleryRow],
    ) -> MetadataResult<()>;

    /// Remove one image from an owner's gallery. Returns whether a row was removed.
    async fn remove_gallery_image(
        &mut self,
        site: GallerySite,
        owner_id: Uuid,
        image_id: ImageId,
    ) -> MetadataResult<bool>;
}

#[async_trait]
impl GalleryRepo for SqliteConnection {
    async fn gallery_images(
        &mut self,
        site: GallerySite,
        owner_id: Uuid,
    ) -> MetadataResult<Vec<GalleryEntry>> {
        let sql = format!(
            "SELECT m.image_id, m.position, i.object_key \
             FROM {table} m JOIN images i ON i.image_id = m.image_id \
             WHERE m.{owner} = ? ORDER BY m.position",
            table = site.table(),
            owner = site.owner_column()
        );
        let rows = sqlx::query_as::<_, GalleryEntry>(&sql)
            .bind(owner_id)
            .fetch_all(&mut *self)
            .await?;
        Ok(rows)
    }

    async fn replace_gallery(
        &mut self,
        site: GallerySite,
        owner_id: Uuid,
        rows: &[GalleryRow],
    ) -> MetadataResult<()> {
        let delete = format!(
            "DELETE FROM {} WHERE {} = ?",
            site.table(),
            site.owner_column()
        );
        sqlx::query(&delete)
            .bind(owner_id)
            .execute(&mut *self)
            .await?;

        let insert = format!(
            "INSERT INTO {} ({}, image_id, position) VALUES (?, ?, ?)",
            site.table(),
            site.owner_column()
        );
        for row in rows {
            sqlx::query(&insert)
                .bind(owner_id)
                .bind(row.image_id.as_uuid())
                .bind(i64::from(row.position))
                .execute(&mut *self)
                .await
                .map_err(|e| {
                    MetadataError::from_insert(e, || {
                        format!("{} position {} for {owner_id}", site.table(), row.position)
                    })
                })?;
        }
        Ok(())
    }

    async fn remove_gallery_image(
        &mut self,
        site: GallerySite,
        owner_id: Uuid,
        image_id: ImageId,
    ) -> MetadataResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ? AND image_id = ?",
            site.table(),
            site.owner_column()
        );
        let result = sqlx::query(&sql)
            .bind(owner_id)
            .bind(image_id.as_uuid())
            .execute(&mut *self)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
