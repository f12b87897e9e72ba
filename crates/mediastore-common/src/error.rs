//! Error types for mediastore
//!
//! This module defines the error type reported by the upload and
//! retrieval pipelines. Every kind survives up to the transport layer so
//! it can be mapped to a distinct status code.

use crate::source::MetadataSourceError;
use crate::types::IdentifierError;
use thiserror::Error;

/// Common result type for mediastore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for mediastore
#[derive(Debug, Error)]
pub enum Error {
    // Upload form errors
    #[error("missing form field: {0}")]
    MissingField(String),

    #[error("invalid media metadata: {0}")]
    InvalidMetadata(String),

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("entity too large: max {max_size} bytes")]
    EntityTooLarge { max_size: u64 },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    // Integrity errors
    #[error("checksum mismatch: declared {declared}, computed {computed}")]
    ChecksumMismatch { declared: String, computed: String },

    #[error("size mismatch: declared {declared} bytes, wrote {actual} bytes")]
    SizeMismatch { declared: u64, actual: u64 },

    // Lookup errors
    #[error("media not found: {media_id} (entity {entity_id})")]
    NotFound { media_id: String, entity_id: String },

    #[error("metadata source error: {0}")]
    MetadataSource(#[from] MetadataSourceError),

    // Local errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a missing form field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Create a malformed multipart error
    pub fn multipart(msg: impl Into<String>) -> Self {
        Self::Multipart(msg.into())
    }

    /// Create a not found error for a media file
    pub fn not_found(media_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::NotFound {
            media_id: media_id.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Check if this is a not found error, whether raised locally or by
    /// the metadata source
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::MetadataSource(MetadataSourceError::NotFound(_))
        )
    }

    /// Get HTTP status code for the transport layer
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::MissingField(_)
            | Self::InvalidMetadata(_)
            | Self::Multipart(_)
            | Self::InvalidIdentifier(_)
            | Self::ChecksumMismatch { .. }
            | Self::SizeMismatch { .. } => 400,

            // 404 Not Found
            Self::NotFound { .. } | Self::MetadataSource(MetadataSourceError::NotFound(_)) => 404,

            // 413 Payload Too Large
            Self::EntityTooLarge { .. } => 413,

            // 500 Internal Server Error
            Self::MetadataSource(MetadataSourceError::Backend(_))
            | Self::Io(_)
            | Self::Configuration(_) => 500,
        }
    }

    /// Get a stable machine-readable error code
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MissingField",
            Self::InvalidMetadata(_) => "InvalidMetadata",
            Self::Multipart(_) => "MalformedMultipart",
            Self::EntityTooLarge { .. } => "EntityTooLarge",
            Self::InvalidIdentifier(_) => "InvalidIdentifier",
            Self::ChecksumMismatch { .. } => "ChecksumMismatch",
            Self::SizeMismatch { .. } => "SizeMismatch",
            Self::NotFound { .. } | Self::MetadataSource(MetadataSourceError::NotFound(_)) => {
                "NotFound"
            }
            Self::MetadataSource(MetadataSourceError::Backend(_)) => "MetadataSourceError",
            Self::Io(_) | Self::Configuration(_) => "InternalError",
        }
    }
}
