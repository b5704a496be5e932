//! Decoding, orientation, resizing and encoding on top of the `image` crate.
//!
//! Everything here is synchronous and CPU bound; callers run it on the
//! blocking pool.

use super::geometry::{centered_offset, contain_fit, long_edge_fit, pre_shrink_ratio};
use encore_core::{OutputFormat, ResizeMode, VariantSpec};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, ImageResult, Limits, Rgba, RgbaImage};
use std::io::Cursor;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Decode limits and the large-source pre-shrink policy.
#[derive(Clone, Copy, Debug)]
pub struct DecodeOptions {
    pub max_decode_bytes: u64,
    pub pre_shrink_threshold_pixels: u64,
}

/// A decoded, upright original ready for resizing.
#[derive(Debug)]
pub struct Source {
    /// Working pixels, possibly pre-shrunk.
    pub image: DynamicImage,
    /// Upright dimensions of the original before any pre-shrink.
    pub width: u32,
    pub height: u32,
}

/// Decode `bytes`, apply the EXIF orientation, and pre-shrink very large
/// sources by `ceil(long / target)` per edge so each spec resizes a small
/// image.
///
/// The decode runs at full resolution; `max_decode_bytes` is the only bound
/// on its peak memory.
pub fn decode(bytes: &[u8], options: DecodeOptions, target_long_edge: u32) -> ImageResult<Source> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let mut limits = Limits::default();
    limits.max_alloc = Some(options.max_decode_bytes);
    reader.limits(limits);

    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let image = apply_orientation(DynamicImage::from_decoder(decoder)?, orientation);

    let (width, height) = (image.width(), image.height());
    let pixels = u64::from(width) * u64::from(height);
    let ratio = pre_shrink_ratio(width.max(height), target_long_edge);
    let image = if pixels > options.pre_shrink_threshold_pixels && ratio > 1 {
        tracing::debug!(width, height, ratio, "pre-shrinking large source");
        image.thumbnail((width / ratio).max(1), (height / ratio).max(1))
    } else {
        image
    };

    Ok(Source {
        image,
        width,
        height,
    })
}

/// Rotate according to the EXIF orientation. Mirrored orientations are left as decoded.
pub fn apply_orientation(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Rotate90 => image.rotate90(),
        Orientation::Rotate180 => image.rotate180(),
        Orientation::Rotate270 => image.rotate270(),
        _ => image,
    }
}

/// Produce the pixels for one spec. Output sizes are computed from the
/// original dimensions, so a pre-shrunk source yields the same geometry.
pub fn render(source: &Source, mode: ResizeMode, format: OutputFormat) -> DynamicImage {
    match mode {
        ResizeMode::Contain { width, height } => {
            let fitted = contain_fit(source.width, source.height, width, height);
            let resized = resize_to(&source.image, fitted);
            let fill = if format.supports_alpha() {
                TRANSPARENT
            } else {
                WHITE
            };
            let mut canvas = RgbaImage::from_pixel(width, height, fill);
            let (x, y) = centered_offset((width, height), fitted);
            imageops::overlay(&mut canvas, &resized.to_rgba8(), x, y);
            DynamicImage::ImageRgba8(canvas)
        }
        ResizeMode::LongEdge(max) => {
            let target = long_edge_fit(source.width, source.height, max);
            resize_to(&source.image, target)
        }
    }
}

fn resize_to(image: &DynamicImage, (width, height): (u32, u32)) -> DynamicImage {
    if image.width() == width && image.height() == height {
        image.clone()
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }
}

/// Encode with the spec's format and quality.
pub fn encode(image: &DynamicImage, spec: &VariantSpec) -> ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    match spec.format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel; padding was already painted white.
            let rgb = image.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, spec.quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
        OutputFormat::Png => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(PngEncoder::new(&mut buf))?;
        }
        OutputFormat::Webp => {
            // `spec.quality` does not apply to the lossless encoder.
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_with_encoder(WebPEncoder::new_lossless(&mut buf))?;
        }
    }
    Ok(buf)
}
