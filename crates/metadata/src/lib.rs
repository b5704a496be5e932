//! Relational persistence for the encore asset pipeline.
//!
//! This crate provides:
//! - The image table and its lifecycle columns
//! - Profile-image columns and ordered gallery mapping rows
//! - Reference counting across every owner table
//! - [`UnitOfWork`]: a transaction with after-commit side effects

pub mod error;
pub mod models;
pub mod repos;
pub mod store;
pub mod uow;

pub use error::{MetadataError, MetadataResult};
pub use models::{GalleryEntry, GalleryRow, ImageRow};
pub use repos::{
    GalleryRepo, GallerySite, ImageRepo, ProfileImageRepo, ProfileSite, ReferenceRepo,
    ReferenceSite,
};
pub use store::SqliteStore;
pub use uow::{CommitReport, DeferredTask, TaskError, TaskResult, UnitOfWork};

use encore_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<SqliteStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store))
        }
    }
}
