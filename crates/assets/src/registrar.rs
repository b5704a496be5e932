//! Placeholder rows for staging uploads.

use crate::error::{AssetError, AssetResult};
use encore_core::keys::is_staging_key;
use encore_core::{ImageId, PublicUrlBuilder, UserId};
use encore_metadata::{ImageRepo, ImageRow, MetadataError};
use sqlx::SqliteConnection;
use time::OffsetDateTime;

/// Writes TMP image rows inside the caller's transaction.
#[derive(Clone, Debug)]
pub struct TmpImageRegistrar {
    urls: PublicUrlBuilder,
}

impl TmpImageRegistrar {
    pub fn new(urls: PublicUrlBuilder) -> Self {
        Self { urls }
    }

    /// Insert a TMP row pointing at `key` verbatim.
    ///
    /// `conn` should be the caller's unit-of-work connection so the row rolls
    /// back with the rest of the request.
    pub async fn create_tmp_image(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
        owner: Option<UserId>,
    ) -> AssetResult<ImageId> {
        if key.trim().is_empty() {
            return Err(AssetError::BlankKey);
        }
        let owner = owner.ok_or(AssetError::MissingOwner)?;
        if !is_staging_key(key) {
            return Err(AssetError::InvalidKey(format!("not a staging key: '{key}'")));
        }

        let image_id = ImageId::new();
        let row = ImageRow::tmp(
            image_id,
            key,
            self.urls.url_for(key),
            owner,
            OffsetDateTime::now_utc(),
        );
        match conn.insert_image(&row).await {
            Ok(()) => {}
            Err(MetadataError::AlreadyExists(_)) => {
                return Err(AssetError::DuplicateKey(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(%image_id, key, %owner, "registered tmp image");
        Ok(image_id)
    }
}
