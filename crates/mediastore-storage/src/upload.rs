//! Upload pipeline
//!
//! An upload is accepted in three steps: the binary is written to a
//! hidden staging file next to its final location, the staged bytes are
//! verified against the declared checksum (and size, when declared), and
//! only then is the file renamed into place and the metadata recorded.
//! Any failure before the commit removes what was written, so no record
//! ever describes unverified content.

use crate::form::{BODY_FIELD, FILE_FIELD, MultipartForm};
use crate::layout::StorageLayout;
use crate::service::MediaService;
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use mediastore_common::checksum::verify;
use mediastore_common::{EntityId, Error, Media, MediaId, MediaKind, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

const COMMIT_LOCK_STRIPES: usize = 64;

/// Striped locks pairing the rename of a staged file with its metadata
/// commit, so the record for a path always describes the bytes at it.
pub(crate) struct CommitLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for CommitLocks {
    fn default() -> Self {
        Self {
            stripes: (0..COMMIT_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }
}

impl CommitLocks {
    async fn lock(&self, target: &Path) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        target.hash(&mut hasher);
        let index = usize::try_from(hasher.finish() % COMMIT_LOCK_STRIPES as u64).unwrap_or(0);
        self.stripes[index].lock().await
    }
}

impl MediaService {
    /// Parse a multipart upload and store it for `entity_id`.
    pub async fn insert_media<S, O, E>(
        &self,
        entity_id: &str,
        body: S,
        boundary: &str,
        is_avatar: bool,
    ) -> Result<Media>
    where
        S: Stream<Item = std::result::Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let entity = EntityId::new(entity_id)?;
        let form = MultipartForm::parse(body, boundary, &self.limits).await?;
        self.insert_form(&entity, form, MediaKind::from_avatar_flag(is_avatar))
            .await
    }

    /// Store an already parsed upload form.
    pub async fn insert_form(
        &self,
        entity: &EntityId,
        mut form: MultipartForm,
        kind: MediaKind,
    ) -> Result<Media> {
        let Some(body) = form.take_part(BODY_FIELD) else {
            warn!("Rejected {} upload for {}: no '{}' part", kind, entity, BODY_FIELD);
            return Err(Error::missing_field(BODY_FIELD));
        };
        let mut media: Media = serde_json::from_str(&body.read_text().await?)
            .map_err(|e| Error::InvalidMetadata(e.to_string()))?;

        let Some(file) = form.take_part(FILE_FIELD) else {
            warn!("Rejected {} upload for {}: no '{}' part", kind, entity, FILE_FIELD);
            return Err(Error::missing_field(FILE_FIELD));
        };
        debug!(
            "Received {} bytes for {} (spooled={})",
            file.size(),
            media.id,
            file.is_spooled()
        );

        let media_id = MediaId::new(media.id.clone())?;
        media.entity_id = entity.as_str().to_string();
        if media.file_name.is_none() {
            media.file_name = file.file_name().map(str::to_string);
        }

        let dir = self.layout.dir_for(entity, kind);
        if StorageLayout::ensure_dir(&dir).await? {
            debug!("Created {} directory {}", kind, dir.display());
        }

        let staging = StorageLayout::staging_path(&dir);
        let written = match file.write_to(&staging).await {
            Ok(n) => n,
            Err(e) => {
                error!(
                    "Failed to write upload {} to {}: {}",
                    media_id,
                    staging.display(),
                    e
                );
                discard(&staging).await;
                return Err(e.into());
            }
        };
        drop(file);

        if let Err(e) = verify_staged(&staging, &mut media).await {
            discard(&staging).await;
            return Err(e);
        }

        let target = dir.join(media_id.as_str());
        let _guard = self.commit_locks.lock(&target).await;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            error!("Failed to move upload into {}: {}", target.display(), e);
            discard(&staging).await;
            return Err(e.into());
        }

        media.uploaded_date = Some(Utc::now());
        if let Err(e) = self.commit(&media, kind).await {
            error!("Failed to record {} {} for {}: {}", kind, media_id, entity, e);
            discard(&target).await;
            return Err(e);
        }

        info!(
            "Stored {} {} for {} ({} bytes)",
            kind, media_id, entity, written
        );
        Ok(media)
    }

    async fn commit(&self, media: &Media, kind: MediaKind) -> Result<()> {
        self.source.store_media(media).await?;
        if kind.is_avatar() {
            if let Err(e) = self.source.store_avatar_mapping(media).await {
                if let Err(cleanup) = self.source.delete_media(&media.id).await {
                    warn!("Failed to roll back media record {}: {}", media.id, cleanup);
                }
                return Err(e.into());
            }
        }
        Ok(())
    }
}

/// Hash the staged file and check it against the declared checksum and
/// size. Fills in `file_size` when none was declared.
async fn verify_staged(staging: &Path, media: &mut Media) -> Result<()> {
    let verification = verify(staging, &media.md5_checksum).await.map_err(|e| {
        error!("Failed to hash {}: {}", staging.display(), e);
        e
    })?;
    let digest = verification.digest;

    if !verification.matches {
        warn!(
            "Checksum mismatch for {}: declared {}, computed {}",
            media.id, media.md5_checksum, digest.md5
        );
        return Err(Error::ChecksumMismatch {
            declared: media.md5_checksum.clone(),
            computed: digest.md5,
        });
    }

    match media.file_size {
        Some(declared) if declared != digest.size => {
            warn!(
                "Size mismatch for {}: declared {}, wrote {}",
                media.id, declared, digest.size
            );
            Err(Error::SizeMismatch {
                declared,
                actual: digest.size,
            })
        }
        Some(_) => Ok(()),
        None => {
            media.file_size = Some(digest.size);
            Ok(())
        }
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
