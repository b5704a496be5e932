//! Core domain types for the encore asset pipeline.
//!
//! This crate defines the data model shared by every other crate:
//! - Asset domains and the object-storage key-space convention
//! - Image identity and lifecycle status
//! - Variant specs and the per-domain presets
//! - Public URL construction
//! - Configuration

pub mod config;
pub mod error;
pub mod image;
pub mod keys;
pub mod url;
pub mod variant;

pub use error::{Error, Result};
pub use image::{ImageId, ImageStatus, UserId};
pub use keys::AssetDomain;
pub use url::PublicUrlBuilder;
pub use variant::{OutputFormat, Preset, ResizeMode, VariantSpec};

/// Default upper bound for a promoted original: 10 MiB.
pub const DEFAULT_MAX_OBJECT_BYTES: u64 = 10 * 1024 * 1024;

/// Cache directive applied to promoted originals and derivatives.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Guess a raster image content type from a key or file name extension.
///
/// Returns `None` for anything that is not one of the image formats the
/// pipeline knows how to handle.
pub fn content_type_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
