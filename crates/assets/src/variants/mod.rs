//! Derivative generation for promoted originals.

pub mod geometry;
pub mod render;

use crate::error::{AssetError, AssetResult};
use crate::metrics::{VARIANT_FAILURES, VARIANTS_GENERATED};
use bytes::Bytes;
use encore_core::{Preset, VariantSpec};
use encore_core::keys::derivative_key;
use encore_storage::{ObjectStore, PutOptions};
use render::{DecodeOptions, Source};
use serde::Serialize;
use std::sync::Arc;

/// One uploaded derivative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GeneratedVariant {
    pub filename: String,
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    pub size: u64,
}

/// Reads an original, renders every spec of a preset, and uploads the results
/// next to it.
#[derive(Clone)]
pub struct VariantEngine {
    store: Arc<dyn ObjectStore>,
    cache_control: String,
    decode: DecodeOptions,
}

impl VariantEngine {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cache_control: impl Into<String>,
        decode: DecodeOptions,
    ) -> Self {
        Self {
            store,
            cache_control: cache_control.into(),
            decode,
        }
    }

    /// Generate every spec of `preset` for `original_key`, in order.
    ///
    /// The first failing spec aborts the run. Derivatives uploaded before it
    /// stay in place.
    #[tracing::instrument(skip(self, preset), fields(preset = preset.name))]
    pub async fn generate(
        &self,
        original_key: &str,
        preset: &'static Preset,
    ) -> AssetResult<Vec<GeneratedVariant>> {
        let result = self.generate_inner(original_key, preset).await;
        if result.is_err() {
            VARIANT_FAILURES.inc();
        }
        result
    }

    async fn generate_inner(
        &self,
        original_key: &str,
        preset: &'static Preset,
    ) -> AssetResult<Vec<GeneratedVariant>> {
        let target_long_edge = preset.max_long_edge()?;
        let specs = preset.specs;

        let bytes = self
            .store
            .get(original_key)
            .await
            .map_err(|e| AssetError::storage_op("get", original_key, e))?;

        let options = self.decode;
        let source = tokio::task::spawn_blocking(move || {
            render::decode(&bytes, options, target_long_edge)
        })
        .await
        .map_err(|e| AssetError::Internal(format!("decode task failed: {e}")))?
        .map_err(|e| AssetError::UnsupportedImage {
            key: original_key.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(
            key = original_key,
            width = source.width,
            height = source.height,
            "decoded original"
        );

        let source = Arc::new(source);
        let mut generated = Vec::with_capacity(specs.len());
        for spec in specs {
            let variant = self
                .generate_one(original_key, source.clone(), spec)
                .await
                .map_err(|reason| AssetError::ImageProcessing {
                    filename: spec.filename.to_string(),
                    reason,
                })?;
            VARIANTS_GENERATED.inc();
            generated.push(variant);
        }
        Ok(generated)
    }

    async fn generate_one(
        &self,
        original_key: &str,
        source: Arc<Source>,
        spec: &'static VariantSpec,
    ) -> Result<GeneratedVariant, String> {
        let mode = spec.mode().map_err(|e| e.to_string())?;
        let (encoded, width, height) = tokio::task::spawn_blocking(move || {
            let image = render::render(&source, mode, spec.format);
            render::encode(&image, spec).map(|bytes| (bytes, image.width(), image.height()))
        })
        .await
        .map_err(|e| format!("render task failed: {e}"))?
        .map_err(|e| e.to_string())?;

        let key = derivative_key(original_key, spec.filename);
        let size = encoded.len() as u64;
        self.store
            .put(
                &key,
                Bytes::from(encoded),
                PutOptions::new(spec.format.content_type(), self.cache_control.as_str()),
            )
            .await
            .map_err(|e| format!("upload to {key} failed: {e}"))?;

        tracing::debug!(key = %key, width, height, size, "uploaded variant");
        Ok(GeneratedVariant {
            filename: spec.filename.to_string(),
            key,
            width,
            height,
            content_type: spec.format.content_type(),
            size,
        })
    }
}
