//! Image repository.

use crate::error::{MetadataError, MetadataResult};
use crate::models::ImageRow;
use async_trait::async_trait;
use encore_core::{ImageId, ImageStatus};
use sqlx::SqliteConnection;

/// Find, insert and save image rows.
#[async_trait]
pub trait ImageRepo: Send {
    async fn find_image(&mut self, image_id: ImageId) -> MetadataResult<Option<ImageRow>>;

    /// Move a live TMP row registered for `staging_key` to COMMITTED at `key`
    /// in a single statement. Returns false when the row is no longer in
    /// that state, e.g. it was promoted or deleted concurrently.
    async fn commit_promotion(
        &mut self,
        image_id: ImageId,
        staging_key: &str,
        key: &str,
        public_url: &str,
    ) -> MetadataResult<bool>;

    /// Insert a new row. Fails with `AlreadyExists` on a duplicate id or key.
    async fn insert_image(&mut self, row: &ImageRow) -> MetadataResult<()>;

    /// Persist every mutable column of an existing row.
    async fn save_image(&mut self, row: &ImageRow) -> MetadataResult<()>;

    async fn image_exists(&mut self, image_id: ImageId) -> MetadataResult<bool>;
}

#[async_trait]
impl ImageRepo for SqliteConnection {
    async fn find_image(&mut self, image_id: ImageId) -> MetadataResult<Option<ImageRow>> {
        let row = sqlx::query_as::<_, ImageRow>("SELECT * FROM images WHERE image_id = ?")
            .bind(image_id.as_uuid())
            .fetch_optional(&mut *self)
            .await?;
        Ok(row)
    }

    async fn commit_promotion(
        &mut self,
        image_id: ImageId,
        staging_key: &str,
        key: &str,
        public_url: &str,
    ) -> MetadataResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET object_key = ?, public_url = ?, status = ?
            WHERE image_id = ? AND object_key = ? AND status = ? AND deleted_at IS NULL
            "#,
        )
        .bind(key)
        .bind(public_url)
        .bind(ImageStatus::Committed.as_str())
        .bind(image_id.as_uuid())
        .bind(staging_key)
        .bind(ImageStatus::Tmp.as_str())
        .execute(&mut *self)
        .await
        .map_err(|e| MetadataError::from_insert(e, || format!("image with key {key}")))?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_image(&mut self, row: &ImageRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO images (image_id, object_key, public_url, status, owner_user_id, created_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.image_id)
        .bind(&row.object_key)
        .bind(&row.public_url)
        .bind(&row.status)
        .bind(row.owner_user_id)
        .bind(row.created_at)
        .bind(row.deleted_at)
        .execute(&mut *self)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, || format!("image with key {}", row.object_key))
        })?;
        Ok(())
    }

    async fn save_image(&mut self, row: &ImageRow) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET object_key = ?, public_url = ?, status = ?, owner_user_id = ?, deleted_at = ?
            WHERE image_id = ?
            "#,
        )
        .bind(&row.object_key)
        .bind(&row.public_url)
        .bind(&row.status)
        .bind(row.owner_user_id)
        .bind(row.deleted_at)
        .bind(row.image_id)
        .execute(&mut *self)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, || format!("image with key {}", row.object_key))
        })?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("image {}", row.image_id)));
        }
        Ok(())
    }

    async fn image_exists(&mut self, image_id: ImageId) -> MetadataResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM images WHERE image_id = ?)")
                .bind(image_id.as_uuid())
                .fetch_one(&mut *self)
                .await?;
        Ok(exists)
    }
}
