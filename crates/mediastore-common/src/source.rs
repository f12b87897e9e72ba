//! Metadata source interface
//!
//! The storage pipelines never touch the metadata database directly; they
//! go through this trait. The redb-backed implementation lives in
//! `mediastore-meta-store`, tests substitute in-memory doubles.

use crate::types::Media;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Errors surfaced by a metadata source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataSourceError {
    /// The requested record or mapping does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// The backend itself failed
    #[error("metadata backend error: {0}")]
    Backend(String),
}

impl MetadataSourceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type SourceResult<T> = std::result::Result<T, MetadataSourceError>;

/// Durable media records and the entity to avatar mapping.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Media id of the avatar registered for `entity_id`
    async fn avatar_id_for(&self, entity_id: &str) -> SourceResult<String>;

    /// Declared mime type of a stored media record
    async fn mime_type_for(&self, media_id: &str) -> SourceResult<String>;

    /// Full media record
    async fn get_media(&self, media_id: &str) -> SourceResult<Media>;

    /// Records owned by `entity_id`, optionally only those uploaded at or
    /// after `since`, oldest first
    async fn list_media(
        &self,
        entity_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<Media>>;

    /// Insert or replace the record for `media.id`
    async fn store_media(&self, media: &Media) -> SourceResult<()>;

    /// Point `media.entity_id`'s avatar at `media.id`
    async fn store_avatar_mapping(&self, media: &Media) -> SourceResult<()>;

    /// Remove a media record; removing an absent record succeeds
    async fn delete_media(&self, media_id: &str) -> SourceResult<()>;

    /// Remove an entity's avatar pointer; removing an absent pointer succeeds
    async fn delete_avatar_mapping(&self, entity_id: &str) -> SourceResult<()>;

    /// Stamp the record's last-viewed time with the current time
    async fn touch_last_viewed(&self, media_id: &str) -> SourceResult<()>;
}
