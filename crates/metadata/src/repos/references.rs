//! Reference counting across owner tables.

use super::ReferenceSite;
use crate::error::MetadataResult;
use async_trait::async_trait;
use encore_core::ImageId;
use sqlx::SqliteConnection;

#[async_trait]
pub trait ReferenceRepo: Send {
    /// Number of rows at `site` that reference `image_id`.
    async fn count_references(
        &mut self,
        site: ReferenceSite,
        image_id: ImageId,
    ) -> MetadataResult<u64>;
}

#[async_trait]
impl ReferenceRepo for SqliteConnection {
    async fn count_references(
        &mut self,
        site: ReferenceSite,
        image_id: ImageId,
    ) -> MetadataResult<u64> {
        let (table, column) = site.reference_column();
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(image_id.as_uuid())
            .fetch_one(&mut *self)
            .await?;
        Ok(count.max(0) as u64)
    }
}
