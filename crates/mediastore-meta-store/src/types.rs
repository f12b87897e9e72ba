//! Stored types for metadata persistence.
//!
//! These types are serialized to redb via bincode. Timestamps are kept as
//! unix milliseconds so the encoding does not depend on chrono's serde
//! representation.

use chrono::{DateTime, Utc};
use mediastore_common::Media;
use serde::{Deserialize, Serialize};

/// Media record as persisted in the `media` table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub id: String,
    pub entity_id: String,
    pub mime_type: String,
    pub md5_checksum: String,
    pub file_size: Option<u64>,
    pub file_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub uploaded_at_ms: Option<i64>,
    pub last_viewed_at_ms: Option<i64>,
}

fn to_millis(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp_millis())
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

impl From<&Media> for StoredMedia {
    fn from(media: &Media) -> Self {
        Self {
            id: media.id.clone(),
            entity_id: media.entity_id.clone(),
            mime_type: media.mime_type.clone(),
            md5_checksum: media.md5_checksum.clone(),
            file_size: media.file_size,
            file_name: media.file_name.clone(),
            title: media.title.clone(),
            description: media.description.clone(),
            author: media.author.clone(),
            height: media.height,
            width: media.width,
            uploaded_at_ms: to_millis(media.uploaded_date),
            last_viewed_at_ms: to_millis(media.last_viewed_date),
        }
    }
}

impl From<StoredMedia> for Media {
    fn from(stored: StoredMedia) -> Self {
        Self {
            id: stored.id,
            entity_id: stored.entity_id,
            mime_type: stored.mime_type,
            md5_checksum: stored.md5_checksum,
            file_size: stored.file_size,
            file_name: stored.file_name,
            title: stored.title,
            description: stored.description,
            author: stored.author,
            height: stored.height,
            width: stored.width,
            uploaded_date: from_millis(stored.uploaded_at_ms),
            last_viewed_date: from_millis(stored.last_viewed_at_ms),
        }
    }
}
