//! Asset lifecycle and variant generation for encore.
//!
//! An upload lands under `tmp/` and is registered as a TMP row inside the
//! caller's transaction. Only after that transaction commits is the object
//! moved under `inline/`, the row flipped to COMMITTED, and the domain's
//! derivatives rendered next to it. Images nothing references any more are
//! moved under `trash/` and soft-deleted.
//!
//! The one ordering rule every component keeps: a database commit happens
//! before any storage mutation that a committed row depends on.

pub mod attach;
pub mod deferred;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod promotion;
pub mod reclaim;
pub mod registrar;
pub mod usage;
pub mod variants;
pub mod waiter;

pub use attach::{
    AttachmentService, GalleryItem, GallerySlot, ImageChange, ImageSlot, OwnerGallery, ProfileSlot,
};
pub use deferred::AfterCommit;
pub use error::{AssetError, AssetResult, FailureClass};
pub use guard::StagingGuard;
pub use promotion::{PromotionOutcome, PromotionService, VariantOutcome};
pub use reclaim::{OrphanReclaimer, ReclaimReport};
pub use registrar::TmpImageRegistrar;
pub use usage::{SqliteUsageCounter, UsageCounter, UsageRegistry};
pub use variants::{GeneratedVariant, VariantEngine};
pub use waiter::{ExistenceWaiter, Visibility};

use encore_core::PublicUrlBuilder;
use encore_core::config::AssetConfig;
use encore_metadata::SqliteStore;
use encore_storage::ObjectStore;
use std::sync::Arc;
use variants::render::DecodeOptions;

/// Every pipeline component wired against one store pair and configuration.
pub struct AssetPipeline {
    pub attachments: AttachmentService,
    pub promotion: Arc<PromotionService>,
    pub reclaimer: Arc<OrphanReclaimer>,
    pub usage: Arc<UsageRegistry>,
}

impl AssetPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        metadata: Arc<SqliteStore>,
        config: &AssetConfig,
    ) -> AssetResult<Self> {
        config.validate().map_err(encore_core::Error::Config)?;
        metrics::register_metrics();

        let urls = PublicUrlBuilder::new(config.public_base_url.as_str());
        let waiter = ExistenceWaiter::new(
            store.clone(),
            config.existence_wait_attempts,
            config.existence_wait_step(),
        );
        let engine = VariantEngine::new(
            store.clone(),
            config.cache_control.as_str(),
            DecodeOptions {
                max_decode_bytes: config.max_decode_bytes,
                pre_shrink_threshold_pixels: config.pre_shrink_threshold_pixels,
            },
        );
        let promotion = Arc::new(PromotionService::new(
            store.clone(),
            metadata.clone(),
            config.clone(),
            waiter,
            engine,
        ));
        let reclaimer = Arc::new(OrphanReclaimer::new(
            store.clone(),
            metadata.clone(),
            urls.clone(),
        ));
        let usage = Arc::new(UsageRegistry::sqlite(metadata));
        let attachments = AttachmentService::new(
            StagingGuard::new(store),
            TmpImageRegistrar::new(urls),
            promotion.clone(),
            reclaimer.clone(),
            usage.clone(),
        );

        Ok(Self {
            attachments,
            promotion,
            reclaimer,
            usage,
        })
    }
}
