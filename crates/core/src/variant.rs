//! Variant specs and the per-domain presets.

use crate::error::{Error, Result};
use crate::keys::AssetDomain;
use serde::Serialize;

/// Encoded output format of a derivative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    /// Always encoded lossless; the `image` crate ships no lossy WebP encoder.
    Webp,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// Whether contain-mode padding can be transparent.
    pub fn supports_alpha(&self) -> bool {
        matches!(self, Self::Png | Self::Webp)
    }
}

/// How a spec maps source dimensions to output dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeMode {
    /// Fit proportionally inside the box (never upscaling), then pad to exactly the box.
    Contain { width: u32, height: u32 },
    /// Bound the long edge, never upscaling, no padding.
    LongEdge(u32),
}

/// One derivative to produce from a promoted original.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VariantSpec {
    /// Output file name, placed under the original's derivative directory.
    pub filename: &'static str,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: OutputFormat,
    /// Encoder quality, 1-100. Only JPEG uses it; PNG and WebP output is
    /// lossless, so specs for them carry 100.
    pub quality: u8,
}

impl VariantSpec {
    pub const fn contain(
        filename: &'static str,
        width: u32,
        height: u32,
        format: OutputFormat,
        quality: u8,
    ) -> Self {
        Self {
            filename,
            width: Some(width),
            height: Some(height),
            format,
            quality,
        }
    }

    pub const fn long_edge(
        filename: &'static str,
        max: u32,
        format: OutputFormat,
        quality: u8,
    ) -> Self {
        Self {
            filename,
            width: Some(max),
            height: None,
            format,
            quality,
        }
    }

    /// Resolve the resize mode. A spec with no dimension, or a zero dimension, is invalid.
    pub fn mode(&self) -> Result<ResizeMode> {
        match (self.width, self.height) {
            (Some(0), _) | (_, Some(0)) => Err(self.invalid("dimensions must be positive")),
            (Some(width), Some(height)) => Ok(ResizeMode::Contain { width, height }),
            (Some(max), None) | (None, Some(max)) => Ok(ResizeMode::LongEdge(max)),
            (None, None) => Err(self.invalid("at least one dimension is required")),
        }
    }

    /// Long edge this spec may produce at most.
    pub fn target_long_edge(&self) -> Result<u32> {
        Ok(match self.mode()? {
            ResizeMode::Contain { width, height } => width.max(height),
            ResizeMode::LongEdge(max) => max,
        })
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::InvalidVariantSpec {
            filename: self.filename.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A named, immutable, ordered list of variant specs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: &'static str,
    pub specs: &'static [VariantSpec],
}

impl Preset {
    /// Largest long edge any spec in this preset produces.
    pub fn max_long_edge(&self) -> Result<u32> {
        let mut max = 0;
        for spec in self.specs {
            max = max.max(spec.target_long_edge()?);
        }
        Ok(max)
    }
}

pub const ARTIST_PRESET: Preset = Preset {
    name: "artist",
    specs: &[
        VariantSpec::contain("profile_400x400.jpg", 400, 400, OutputFormat::Jpeg, 85),
        VariantSpec::contain("thumb_160x160.jpg", 160, 160, OutputFormat::Jpeg, 80),
        VariantSpec::long_edge("large_1080.jpg", 1080, OutputFormat::Jpeg, 85),
    ],
};

pub const GROUP_PRESET: Preset = Preset {
    name: "group",
    specs: ARTIST_PRESET.specs,
};

pub const USER_PRESET: Preset = Preset {
    name: "user",
    specs: &[
        VariantSpec::contain("avatar_256x256.png", 256, 256, OutputFormat::Png, 100),
        VariantSpec::contain("avatar_64x64.png", 64, 64, OutputFormat::Png, 100),
    ],
};

pub const EVENT_PRESET: Preset = Preset {
    name: "event",
    specs: &[
        VariantSpec::long_edge("poster_1280.jpg", 1280, OutputFormat::Jpeg, 85),
        VariantSpec::contain("card_640x360.jpg", 640, 360, OutputFormat::Jpeg, 80),
        VariantSpec::long_edge("thumb_320.webp", 320, OutputFormat::Webp, 100),
    ],
};

pub const REVIEW_PRESET: Preset = Preset {
    name: "review",
    specs: &[
        VariantSpec::long_edge("review_1080.jpg", 1080, OutputFormat::Jpeg, 85),
        VariantSpec::contain("review_thumb_240x240.jpg", 240, 240, OutputFormat::Jpeg, 80),
    ],
};

impl AssetDomain {
    /// Preset used when an image is attached through this domain.
    pub fn preset(&self) -> &'static Preset {
        match self {
            Self::Artist => &ARTIST_PRESET,
            Self::Group => &GROUP_PRESET,
            Self::Event => &EVENT_PRESET,
            Self::Review => &REVIEW_PRESET,
            Self::User => &USER_PRESET,
        }
    }
}
