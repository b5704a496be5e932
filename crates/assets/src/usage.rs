//! Reference counting across every owner site.

use crate::error::AssetResult;
use async_trait::async_trait;
use encore_core::ImageId;
use encore_metadata::{ReferenceRepo, ReferenceSite, SqliteStore};
use std::sync::Arc;

/// Counts the live references to an image.
#[async_trait]
pub trait UsageCounter: Send + Sync {
    async fn count_usages(&self, image_id: ImageId) -> AssetResult<u64>;
}

/// Counts references held at a single site.
pub struct SqliteUsageCounter {
    store: Arc<SqliteStore>,
    site: ReferenceSite,
}

impl SqliteUsageCounter {
    pub fn new(store: Arc<SqliteStore>, site: ReferenceSite) -> Self {
        Self { store, site }
    }
}

#[async_trait]
impl UsageCounter for SqliteUsageCounter {
    async fn count_usages(&self, image_id: ImageId) -> AssetResult<u64> {
        let mut conn = self.store.acquire().await?;
        Ok(conn.count_references(self.site, image_id).await?)
    }
}

/// One counter per reference site.
///
/// Every field is required, so adding an owner table means adding a field
/// here, and every construction site stops compiling until it supplies a
/// counter for it.
#[derive(Clone)]
pub struct UsageRegistry {
    pub artist_profile: Arc<dyn UsageCounter>,
    pub group_profile: Arc<dyn UsageCounter>,
    pub user_profile: Arc<dyn UsageCounter>,
    pub event_gallery: Arc<dyn UsageCounter>,
    pub review_gallery: Arc<dyn UsageCounter>,
}

impl UsageRegistry {
    /// Counters backed by the metadata store's owner tables.
    pub fn sqlite(store: Arc<SqliteStore>) -> Self {
        let counter = |site| -> Arc<dyn UsageCounter> {
            Arc::new(SqliteUsageCounter::new(store.clone(), site))
        };
        Self {
            artist_profile: counter(ReferenceSite::ArtistProfile),
            group_profile: counter(ReferenceSite::GroupProfile),
            user_profile: counter(ReferenceSite::UserProfile),
            event_gallery: counter(ReferenceSite::EventGallery),
            review_gallery: counter(ReferenceSite::ReviewGallery),
        }
    }

    fn counters(&self) -> [(&'static str, &Arc<dyn UsageCounter>); 5] {
        [
            (ReferenceSite::ArtistProfile.as_str(), &self.artist_profile),
            (ReferenceSite::GroupProfile.as_str(), &self.group_profile),
            (ReferenceSite::UserProfile.as_str(), &self.user_profile),
            (ReferenceSite::EventGallery.as_str(), &self.event_gallery),
            (ReferenceSite::ReviewGallery.as_str(), &self.review_gallery),
        ]
    }
}

#[async_trait]
impl UsageCounter for UsageRegistry {
    async fn count_usages(&self, image_id: ImageId) -> AssetResult<u64> {
        let mut total = 0;
        for (site, counter) in self.counters() {
            let count = counter.count_usages(image_id).await?;
            if count > 0 {
                tracing::trace!(%image_id, site, count, "image referenced");
            }
            total += count;
        }
        Ok(total)
    }
}
