//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the default credential chain if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the default credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Seconds a statement waits on a locked database before failing.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: u64,
    },
}

fn default_sqlite_query_timeout_secs() -> u64 {
    5
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

/// Asset pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Public URL template; `{key}` is replaced by the percent-encoded object key.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Largest staging object accepted for promotion, in bytes.
    #[serde(default = "default_max_object_bytes")]
    pub max_object_bytes: u64,
    /// Content types accepted for promotion.
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
    /// Cache directive set on promoted originals and derivatives.
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
    /// Metadata reads attempted while waiting for a promoted object to become visible.
    #[serde(default = "default_existence_wait_attempts")]
    pub existence_wait_attempts: u32,
    /// Linear backoff step between existence checks; attempt `n` waits `n * step`.
    #[serde(default = "default_existence_wait_step_ms")]
    pub existence_wait_step_ms: u64,
    /// Allocation ceiling handed to the image decoder.
    #[serde(default = "default_max_decode_bytes")]
    pub max_decode_bytes: u64,
    /// Originals with more pixels than this are shrunk right after decoding,
    /// before any per-spec resize. Decoding itself still happens at full
    /// resolution, bounded by `max_decode_bytes`.
    #[serde(default = "default_pre_shrink_threshold_pixels")]
    pub pre_shrink_threshold_pixels: u64,
}

fn default_public_base_url() -> String {
    "http://localhost:8080/assets/{key}".to_string()
}

fn default_max_object_bytes() -> u64 {
    crate::DEFAULT_MAX_OBJECT_BYTES
}

fn default_allowed_content_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp", "image/gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cache_control() -> String {
    crate::DEFAULT_CACHE_CONTROL.to_string()
}

fn default_existence_wait_attempts() -> u32 {
    5
}

fn default_existence_wait_step_ms() -> u64 {
    200
}

fn default_max_decode_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_pre_shrink_threshold_pixels() -> u64 {
    40_000_000
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
            max_object_bytes: default_max_object_bytes(),
            allowed_content_types: default_allowed_content_types(),
            cache_control: default_cache_control(),
            existence_wait_attempts: default_existence_wait_attempts(),
            existence_wait_step_ms: default_existence_wait_step_ms(),
            max_decode_bytes: default_max_decode_bytes(),
            pre_shrink_threshold_pixels: default_pre_shrink_threshold_pixels(),
        }
    }
}

impl AssetConfig {
    /// Backoff step between existence checks.
    pub fn existence_wait_step(&self) -> Duration {
        Duration::from_millis(self.existence_wait_step_ms)
    }

    /// Whether `content_type` is on the whitelist. Parameters such as `; charset=` are ignored.
    pub fn is_allowed_content_type(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&essence))
    }

    /// Validate asset configuration for settings that would break the pipeline.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_object_bytes == 0 {
            return Err("assets.max_object_bytes must be greater than 0".to_string());
        }
        if self.allowed_content_types.is_empty() {
            return Err("assets.allowed_content_types cannot be empty".to_string());
        }
        if self.existence_wait_attempts == 0 {
            return Err("assets.existence_wait_attempts must be at least 1".to_string());
        }
        if self.public_base_url.trim().is_empty() {
            return Err("assets.public_base_url cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Asset pipeline configuration.
    #[serde(default)]
    pub assets: AssetConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.assets.validate()
    }
}
