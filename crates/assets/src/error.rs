//! Pipeline error types.

use encore_core::ImageId;
use encore_metadata::MetadataError;
use encore_storage::StorageError;
use thiserror::Error;

/// How a failure propagates to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Bad input, detected before any storage mutation. A client error.
    Validation,
    /// Object storage failed during a synchronous operation. A server error.
    Storage,
    /// Anything else: database, decoding internals, configuration.
    Internal,
}

/// Asset pipeline errors.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("image key is blank")]
    BlankKey,

    #[error("image owner is required")]
    MissingOwner,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("staging object not found: {0}")]
    StagingObjectNotFound(String),

    #[error("staging object is empty: {0}")]
    EmptyObject(String),

    #[error("object {key} is {size} bytes, larger than the {max} byte limit")]
    ObjectTooLarge { key: String, size: u64, max: u64 },

    #[error("unsupported content type {content_type:?} for {key}")]
    UnsupportedContentType {
        key: String,
        content_type: Option<String>,
    },

    #[error("duplicate image key in request: {0}")]
    DuplicateKey(String),

    #[error("duplicate gallery position in request: {0}")]
    DuplicatePosition(u32),

    #[error("image not found: {0}")]
    ImageNotFound(ImageId),

    #[error("unsupported image {key}: {reason}")]
    UnsupportedImage { key: String, reason: String },

    #[error("image processing failed for {filename}: {reason}")]
    ImageProcessing { filename: String, reason: String },

    #[error("storage {op} failed for {key}: {source}")]
    StorageOperation {
        op: &'static str,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Core(#[from] encore_core::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AssetError {
    pub(crate) fn storage_op(op: &'static str, key: &str, source: StorageError) -> Self {
        AssetError::StorageOperation {
            op,
            key: key.to_string(),
            source,
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            AssetError::BlankKey
            | AssetError::MissingOwner
            | AssetError::InvalidKey(_)
            | AssetError::StagingObjectNotFound(_)
            | AssetError::EmptyObject(_)
            | AssetError::ObjectTooLarge { .. }
            | AssetError::UnsupportedContentType { .. }
            | AssetError::DuplicateKey(_)
            | AssetError::DuplicatePosition(_)
            | AssetError::ImageNotFound(_)
            | AssetError::UnsupportedImage { .. } => FailureClass::Validation,
            AssetError::Core(encore_core::Error::InvalidKey(_)) => FailureClass::Validation,
            AssetError::StorageOperation { .. } | AssetError::Storage(_) => FailureClass::Storage,
            AssetError::ImageProcessing { .. }
            | AssetError::Metadata(_)
            | AssetError::Core(_)
            | AssetError::Internal(_) => FailureClass::Internal,
        }
    }
}

/// Result type for pipeline operations.
pub type AssetResult<T> = std::result::Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failures_are_client_errors() {
        assert_eq!(AssetError::BlankKey.class(), FailureClass::Validation);
        assert_eq!(
            AssetError::ObjectTooLarge {
                key: "tmp/a.jpg".into(),
                size: 11,
                max: 10
            }
            .class(),
            FailureClass::Validation
        );
        assert_eq!(
            AssetError::Core(encore_core::Error::InvalidKey("x".into())).class(),
            FailureClass::Validation
        );
    }

    #[test]
    fn storage_operation_keeps_context() {
        let err = AssetError::storage_op(
            "copy",
            "tmp/a.jpg",
            StorageError::NotFound("tmp/a.jpg".into()),
        );
        assert_eq!(err.class(), FailureClass::Storage);
        assert_eq!(
            err.to_string(),
            "storage copy failed for tmp/a.jpg: object not found: tmp/a.jpg"
        );
    }

    #[test]
    fn database_failures_are_internal() {
        let err = AssetError::from(MetadataError::NotFound("image".into()));
        assert_eq!(err.class(), FailureClass::Internal);
    }
}
