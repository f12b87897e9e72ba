//! Persistent metadata store backed by redb.
//!
//! Provides typed put/get/delete methods for the media and avatar tables.
//! All writes are synchronous (write txn + commit). Unlike a cache-fronted
//! store, every read goes to the database: the pipelines re-query on each
//! request.

use crate::tables;
use crate::types::StoredMedia;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediastore_common::{Media, MetadataSource, MetadataSourceError, SourceResult};
use redb::{Database, ReadableTable};
use std::path::Path;
use tracing::{debug, error};

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum MetaStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for MetaStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<MetaStoreError> for MetadataSourceError {
    fn from(e: MetaStoreError) -> Self {
        error!("Metadata store failure: {}", e);
        Self::Backend(e.to_string())
    }
}

pub type MetaStoreResult<T> = Result<T, MetaStoreError>;

/// Persistent metadata store backed by redb.
pub struct MetaStore {
    db: Database,
}

impl MetaStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> MetaStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::MEDIA)?;
            let _t = write_txn.open_table(tables::ENTITY_AVATARS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // ---- Media records (bincode) ----

    pub fn put_media(&self, media: &StoredMedia) -> MetaStoreResult<()> {
        let bytes = bincode::serialize(media)?;
        self.put_bytes(tables::MEDIA, &media.id, &bytes)
    }

    pub fn get_media_record(&self, media_id: &str) -> MetaStoreResult<Option<StoredMedia>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::MEDIA)?;
        match table.get(media_id)? {
            Some(val) => Ok(Some(bincode::deserialize(val.value())?)),
            None => Ok(None),
        }
    }

    pub fn delete_media_record(&self, media_id: &str) -> MetaStoreResult<()> {
        self.delete_key(tables::MEDIA, media_id)
    }

    /// Records owned by `entity_id`, oldest upload first.
    ///
    /// Undecodable rows are logged and skipped.
    pub fn load_entity_media(&self, entity_id: &str) -> MetaStoreResult<Vec<StoredMedia>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::MEDIA)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let key = entry.0.value().to_string();
            match bincode::deserialize::<StoredMedia>(entry.1.value()) {
                Ok(media) if media.entity_id == entity_id => result.push(media),
                Ok(_) => {}
                Err(e) => error!("Failed to decode media '{}': {}", key, e),
            }
        }
        result.sort_by(|a, b| {
            a.uploaded_at_ms
                .cmp(&b.uploaded_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(result)
    }

    /// Set the last-viewed timestamp in a single write transaction.
    ///
    /// Returns `false` when no record exists for `media_id`.
    pub fn touch_media(&self, media_id: &str, at: DateTime<Utc>) -> MetaStoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let touched = {
            let mut table = write_txn.open_table(tables::MEDIA)?;
            // Decode, then drop the guard before mutating
            let current = match table.get(media_id)? {
                Some(val) => Some(bincode::deserialize::<StoredMedia>(val.value())?),
                None => None,
            };
            match current {
                Some(mut media) => {
                    media.last_viewed_at_ms = Some(at.timestamp_millis());
                    let bytes = bincode::serialize(&media)?;
                    table.insert(media_id, bytes.as_slice())?;
                    true
                }
                None => false,
            }
        };
        if touched {
            write_txn.commit()?;
        }
        Ok(touched)
    }

    // ---- Entity avatars (string values) ----

    pub fn put_avatar(&self, entity_id: &str, media_id: &str) -> MetaStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::ENTITY_AVATARS)?;
            table.insert(entity_id, media_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_avatar(&self, entity_id: &str) -> MetaStoreResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::ENTITY_AVATARS)?;
        Ok(table.get(entity_id)?.map(|v| v.value().to_string()))
    }

    pub fn delete_avatar(&self, entity_id: &str) -> MetaStoreResult<()> {
        self.delete_key(tables::ENTITY_AVATARS, entity_id)
    }

    // ---- Generic helpers ----

    fn put_bytes(
        &self,
        table_def: redb::TableDefinition<&str, &[u8]>,
        key: &str,
        value: &[u8],
    ) -> MetaStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_def)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_key<V: redb::Value>(
        &self,
        table_def: redb::TableDefinition<&str, V>,
        key: &str,
    ) -> MetaStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_def)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl MetadataSource for MetaStore {
    async fn avatar_id_for(&self, entity_id: &str) -> SourceResult<String> {
        self.get_avatar(entity_id)?
            .ok_or_else(|| MetadataSourceError::not_found(format!("avatar for {entity_id}")))
    }

    async fn mime_type_for(&self, media_id: &str) -> SourceResult<String> {
        self.get_media_record(media_id)?
            .map(|m| m.mime_type)
            .ok_or_else(|| MetadataSourceError::not_found(format!("media {media_id}")))
    }

    async fn get_media(&self, media_id: &str) -> SourceResult<Media> {
        self.get_media_record(media_id)?
            .map(Media::from)
            .ok_or_else(|| MetadataSourceError::not_found(format!("media {media_id}")))
    }

    async fn list_media(
        &self,
        entity_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<Media>> {
        let since_ms = since.map(|t| t.timestamp_millis());
        Ok(self
            .load_entity_media(entity_id)?
            .into_iter()
            .filter(|m| match since_ms {
                Some(since) => m.uploaded_at_ms.is_some_and(|at| at >= since),
                None => true,
            })
            .map(Media::from)
            .collect())
    }

    async fn store_media(&self, media: &Media) -> SourceResult<()> {
        self.put_media(&StoredMedia::from(media))?;
        debug!("Stored metadata for media '{}'", media.id);
        Ok(())
    }

    async fn store_avatar_mapping(&self, media: &Media) -> SourceResult<()> {
        self.put_avatar(&media.entity_id, &media.id)?;
        debug!("Avatar of '{}' is now '{}'", media.entity_id, media.id);
        Ok(())
    }

    async fn delete_media(&self, media_id: &str) -> SourceResult<()> {
        self.delete_media_record(media_id)?;
        Ok(())
    }

    async fn delete_avatar_mapping(&self, entity_id: &str) -> SourceResult<()> {
        self.delete_avatar(entity_id)?;
        Ok(())
    }

    async fn touch_last_viewed(&self, media_id: &str) -> SourceResult<()> {
        if self.touch_media(media_id, Utc::now())? {
            Ok(())
        } else {
            Err(MetadataSourceError::not_found(format!("media {media_id}")))
        }
    }
}
