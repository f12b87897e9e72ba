//! Core type definitions for mediastore
//!
//! This module defines the media record exchanged with clients and the
//! metadata source, plus the validated identifiers used to build paths.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory name reserved for the avatar subtree under the storage root.
pub const AVATARS_DIR: &str = "avatars";

/// Name prefix of in-flight upload files inside an entity directory.
pub const STAGING_PREFIX: &str = ".upload.";

/// Longest identifier accepted as a single path segment.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Metadata describing one stored media asset.
///
/// This is the JSON document carried in the `body` part of an upload and
/// returned to clients on success. Only `id`, `mimeType` and `md5Checksum`
/// are required from the uploader.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    /// Opaque identifier, used verbatim as the file name
    pub id: String,
    /// Owning entity (channel or account); set from the request path
    #[serde(default)]
    pub entity_id: String,
    /// Declared content type
    pub mime_type: String,
    /// Client-declared MD5 of the content (hex)
    pub md5_checksum: String,
    /// Declared size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Original file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Image height in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Image width in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Set by the server when the upload is committed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_date: Option<DateTime<Utc>>,
    /// Updated by the server on every successful download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed_date: Option<DateTime<Utc>>,
}

/// Which namespace a media file lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum MediaKind {
    /// Generic media: `<root>/<entity>/<id>`
    #[display("media")]
    Media,
    /// Entity avatar: `<root>/avatars/<entity>/<id>`
    #[display("avatar")]
    Avatar,
}

impl MediaKind {
    /// Select the namespace from an `is_avatar` flag
    #[must_use]
    pub const fn from_avatar_flag(is_avatar: bool) -> Self {
        if is_avatar { Self::Avatar } else { Self::Media }
    }

    #[must_use]
    pub const fn is_avatar(self) -> bool {
        matches!(self, Self::Avatar)
    }
}

/// Identifier of an owning entity, safe to use as a directory name.
#[derive(Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct EntityId(String);

impl EntityId {
    /// Create a new entity id (rejects path-unsafe and reserved values)
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        validate_segment(&id)?;
        if id == AVATARS_DIR {
            return Err(IdentifierError::Reserved(id));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({:?})", self.0)
    }
}

/// Identifier of a media asset, safe to use as a file name.
#[derive(Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct MediaId(String);

impl MediaId {
    /// Create a new media id (rejects path-unsafe values and names
    /// colliding with staging files)
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        validate_segment(&id)?;
        if id.starts_with(STAGING_PREFIX) {
            return Err(IdentifierError::Reserved(id));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaId({:?})", self.0)
    }
}

/// A value is usable as exactly one path segment below the storage root.
fn validate_segment(id: &str) -> Result<(), IdentifierError> {
    if id.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong);
    }
    if id == "." || id == ".." {
        return Err(IdentifierError::DotSegment);
    }
    for c in id.chars() {
        match c {
            '/' | '\\' => return Err(IdentifierError::PathSeparator(c)),
            '\0' => return Err(IdentifierError::NulByte),
            _ => {}
        }
    }
    Ok(())
}

/// Errors that can occur when validating an identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier cannot be empty")]
    Empty,
    #[error("identifier cannot exceed {MAX_IDENTIFIER_LEN} bytes")]
    TooLong,
    #[error("identifier cannot be '.' or '..'")]
    DotSegment,
    #[error("identifier contains path separator: {0:?}")]
    PathSeparator(char),
    #[error("identifier contains a NUL byte")]
    NulByte,
    #[error("identifier is reserved: {0}")]
    Reserved(String),
}

/// Optional preview dimensions requested by a client.
///
/// A preview is only meaningful when both bounds are present, matching
/// the `maxheight`/`maxwidth` query parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PreviewRequest {
    pub max_height: Option<u32>,
    pub max_width: Option<u32>,
}

impl PreviewRequest {
    #[must_use]
    pub const fn new(max_height: Option<u32>, max_width: Option<u32>) -> Self {
        Self {
            max_height,
            max_width,
        }
    }

    /// Both dimensions as a pair, if a preview was actually requested
    #[must_use]
    pub const fn bounds(&self) -> Option<(u32, u32)> {
        match (self.max_height, self.max_width) {
            (Some(h), Some(w)) => Some((h, w)),
            _ => None,
        }
    }
}
