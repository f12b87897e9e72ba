//! Retrieval pipeline

use crate::service::MediaService;
use chrono::{DateTime, Utc};
use mediastore_common::{
    EntityId, Error, Media, MediaId, MediaKind, MetadataSourceError, PreviewRequest, Result,
};
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A stored file located on disk and ready to be served
#[derive(Clone, Debug)]
pub struct MediaHandle {
    pub media_id: MediaId,
    pub entity_id: EntityId,
    pub kind: MediaKind,
    pub path: PathBuf,
    pub size: u64,
}

impl MediaHandle {
    pub async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    pub async fn read_all(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl MediaService {
    /// Locate a generic media file.
    pub async fn get_media(
        &self,
        entity_id: &str,
        media_id: &str,
        preview: PreviewRequest,
    ) -> Result<MediaHandle> {
        let entity = EntityId::new(entity_id)?;
        let media_id = MediaId::new(media_id)?;
        self.resolve(entity, media_id, MediaKind::Media, preview).await
    }

    /// Locate the current avatar of `entity_id`.
    ///
    /// An entity without an avatar fails with the metadata source's own
    /// not-found error.
    pub async fn get_avatar(
        &self,
        entity_id: &str,
        preview: PreviewRequest,
    ) -> Result<MediaHandle> {
        let entity = EntityId::new(entity_id)?;
        let media_id = MediaId::new(self.source.avatar_id_for(entity.as_str()).await?)?;
        self.resolve(entity, media_id, MediaKind::Avatar, preview).await
    }

    /// Declared mime type of a stored media
    pub async fn get_media_type(&self, media_id: &str) -> Result<String> {
        Ok(self.source.mime_type_for(media_id).await?)
    }

    pub async fn get_media_info(&self, media_id: &str) -> Result<Media> {
        Ok(self.source.get_media(media_id).await?)
    }

    /// Media owned by `entity_id`, optionally only those uploaded since a
    /// point in time
    pub async fn list_media(
        &self,
        entity_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Media>> {
        let entity = EntityId::new(entity_id)?;
        Ok(self.source.list_media(entity.as_str(), since).await?)
    }

    async fn resolve(
        &self,
        entity: EntityId,
        media_id: MediaId,
        kind: MediaKind,
        preview: PreviewRequest,
    ) -> Result<MediaHandle> {
        let mut path = self.layout.file_path(&entity, &media_id, kind);

        let mut size = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                let msg = format!("{} is not a regular file", path.display());
                return Err(io::Error::other(msg).into());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.discard_stale(&entity, &media_id, kind).await?;
                return Err(Error::not_found(media_id.as_str(), entity.as_str()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some((max_height, max_width)) = preview.bounds() {
            if let Some(rendered) = self.preview.render(&path, max_height, max_width).await? {
                debug!("Serving {}x{} preview of {}", max_height, max_width, media_id);
                size = tokio::fs::metadata(&rendered).await?.len();
                path = rendered;
            }
        }

        if let Err(e) = self.source.touch_last_viewed(media_id.as_str()).await {
            warn!("Failed to update last viewed time of {}: {}", media_id, e);
        }

        Ok(MediaHandle {
            media_id,
            entity_id: entity,
            kind,
            path,
            size,
        })
    }

    /// Drop metadata that points at a file which no longer exists
    async fn discard_stale(
        &self,
        entity: &EntityId,
        media_id: &MediaId,
        kind: MediaKind,
    ) -> Result<()> {
        warn!(
            "File for {} {} of {} is missing, removing stale metadata",
            kind, media_id, entity
        );
        self.discard_owned_record(entity, media_id).await?;
        if kind.is_avatar() {
            self.source.delete_avatar_mapping(entity.as_str()).await?;
        }
        Ok(())
    }

    /// Delete the record of `media_id` only if `entity` owns it
    async fn discard_owned_record(&self, entity: &EntityId, media_id: &MediaId) -> Result<()> {
        match self.source.get_media(media_id.as_str()).await {
            Ok(record) if record.entity_id == entity.as_str() => {
                self.source.delete_media(media_id.as_str()).await?;
            }
            Ok(record) => {
                debug!(
                    "Keeping record {}: owned by {}, not {}",
                    media_id, record.entity_id, entity
                );
            }
            Err(MetadataSourceError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::preview::PreviewRenderer;
    use crate::testing::{fixture, upload};
    use async_trait::async_trait;
    use chrono::Utc;
    use mediastore_common::{Error, MetadataSource, MetadataSourceError, PreviewRequest};
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    /// Writes a fixed thumbnail next to the test tree and records each call
    struct Thumbnailer {
        out: PathBuf,
        calls: Mutex<Vec<(PathBuf, u32, u32)>>,
    }

    #[async_trait]
    impl PreviewRenderer for Thumbnailer {
        async fn render(
            &self,
            original: &Path,
            max_height: u32,
            max_width: u32,
        ) -> mediastore_common::Result<Option<PathBuf>> {
            self.calls
                .lock()
                .push((original.to_path_buf(), max_height, max_width));
            tokio::fs::write(&self.out, b"thumb").await?;
            Ok(Some(self.out.clone()))
        }
    }

    #[tokio::test]
    async fn test_upload_then_download_round_trip() {
        let fx = fixture().await;
        let payload = b"0123456789";
        upload(&fx.service, "alice@example.com", "abc123", payload, false)
            .await
            .unwrap();

        let handle = fx
            .service
            .get_media("alice@example.com", "abc123", PreviewRequest::default())
            .await
            .unwrap();

        assert_eq!(handle.path, fx.root().join("alice@example.com/abc123"));
        assert_eq!(handle.size, 10);
        assert_eq!(handle.read_all().await.unwrap(), payload);
        assert_eq!(fx.source.touches(), vec!["abc123"]);
        assert_eq!(
            fx.service.get_media_type("abc123").await.unwrap(),
            "image/jpeg"
        );
        assert!(
            fx.source
                .get_media("abc123")
                .await
                .unwrap()
                .last_viewed_date
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_preview_request_falls_back_to_original() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "abc123", b"pixels", false).await.unwrap();

        let handle = fx
            .service
            .get_media("alice", "abc123", PreviewRequest::new(Some(32), Some(32)))
            .await
            .unwrap();
        assert_eq!(handle.path, fx.root().join("alice/abc123"));
        assert_eq!(handle.read_all().await.unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_rendered_preview_replaces_original() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "abc123", b"full resolution pixels", false)
            .await
            .unwrap();
        let renderer = Arc::new(Thumbnailer {
            out: fx.tmp.path().join("thumb.jpg"),
            calls: Mutex::new(Vec::new()),
        });
        let service = fx.service.clone().with_preview_renderer(renderer.clone());

        let handle = service
            .get_media("alice", "abc123", PreviewRequest::new(Some(48), Some(64)))
            .await
            .unwrap();
        assert_eq!(handle.path, fx.tmp.path().join("thumb.jpg"));
        assert_eq!(handle.size, 5);
        assert_eq!(handle.read_all().await.unwrap(), b"thumb");
        assert_eq!(
            renderer.calls.lock().clone(),
            vec![(fx.root().join("alice/abc123"), 48, 64)]
        );

        let handle = service
            .get_media("alice", "abc123", PreviewRequest::new(Some(48), None))
            .await
            .unwrap();
        assert_eq!(handle.path, fx.root().join("alice/abc123"));
        assert_eq!(handle.size, 22);
        assert_eq!(renderer.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_avatar_round_trip() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "face", b"smile", true).await.unwrap();

        let handle = fx
            .service
            .get_avatar("alice", PreviewRequest::default())
            .await
            .unwrap();
        assert_eq!(handle.path, fx.root().join("avatars/alice/face"));
        assert_eq!(handle.read_all().await.unwrap(), b"smile");
        assert_eq!(fx.source.touches(), vec!["face"]);
    }

    #[tokio::test]
    async fn test_missing_avatar_mapping_is_source_not_found() {
        let fx = fixture().await;

        let err = fx
            .service
            .get_avatar("nobody", PreviewRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MetadataSource(MetadataSourceError::NotFound(_))
        ));
        assert!(fx.source.touches().is_empty());
    }

    #[tokio::test]
    async fn test_missing_avatar_file_heals_metadata() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "face", b"smile", true).await.unwrap();
        std::fs::remove_file(fx.root().join("avatars/alice/face")).unwrap();

        let err = fx
            .service
            .get_avatar("alice", PreviewRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound { ref media_id, ref entity_id }
            if media_id == "face" && entity_id == "alice"));
        assert!(fx.source.avatar_id_for("alice").await.is_err());
        assert!(fx.source.get_media("face").await.is_err());
        assert!(fx.source.touches().is_empty());
    }

    #[tokio::test]
    async fn test_missing_media_file_heals_metadata() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "abc123", b"bytes", false).await.unwrap();
        std::fs::remove_file(fx.root().join("alice/abc123")).unwrap();

        let err = fx
            .service
            .get_media("alice", "abc123", PreviewRequest::default())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(fx.source.get_media("abc123").await.is_err());
    }

    #[tokio::test]
    async fn test_miss_under_other_entity_keeps_record() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "abc123", b"bytes", false).await.unwrap();

        let err = fx
            .service
            .get_media("mallory", "abc123", PreviewRequest::default())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(
            fx.source.get_media("abc123").await.unwrap().entity_id,
            "alice"
        );
    }

    #[tokio::test]
    async fn test_missing_avatar_file_keeps_record_owned_elsewhere() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "face", b"smile", true).await.unwrap();
        upload(&fx.service, "bob", "face", b"holiday", false).await.unwrap();
        std::fs::remove_file(fx.root().join("avatars/alice/face")).unwrap();

        let err = fx
            .service
            .get_avatar("alice", PreviewRequest::default())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(fx.source.avatar_id_for("alice").await.is_err());
        assert_eq!(fx.source.get_media("face").await.unwrap().entity_id, "bob");
        let handle = fx
            .service
            .get_media("bob", "face", PreviewRequest::default())
            .await
            .unwrap();
        assert_eq!(handle.read_all().await.unwrap(), b"holiday");
    }

    #[tokio::test]
    async fn test_staging_files_are_never_served() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "abc123", b"bytes", false).await.unwrap();
        std::fs::write(fx.root().join("alice/.upload.deadbeef"), b"unverified").unwrap();

        let err = fx
            .service
            .get_media("alice", ".upload.deadbeef", PreviewRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidIdentifier(_)));
        assert!(fx.source.touches().is_empty());
    }

    #[tokio::test]
    async fn test_touch_failure_does_not_fail_download() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "abc123", b"bytes", false).await.unwrap();
        fx.source.fail_touch.store(true, Ordering::SeqCst);

        let handle = fx
            .service
            .get_media("alice", "abc123", PreviewRequest::default())
            .await
            .unwrap();
        assert_eq!(handle.size, 5);
        assert_eq!(fx.source.touches().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected_before_lookup() {
        let fx = fixture().await;

        let err = fx
            .service
            .get_media("alice", "..", PreviewRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));

        let err = fx
            .service
            .get_avatar("a/b", PreviewRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_list_media_and_info() {
        let fx = fixture().await;
        upload(&fx.service, "alice", "one", b"1", false).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let cutoff = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        upload(&fx.service, "alice", "two", b"2", false).await.unwrap();
        upload(&fx.service, "bob", "three", b"3", false).await.unwrap();

        let all = fx.service.list_media("alice", None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["one", "two"]);

        let recent = fx.service.list_media("alice", Some(cutoff)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "two");

        let info = fx.service.get_media_info("three").await.unwrap();
        assert_eq!(info.entity_id, "bob");
        assert_eq!(info.file_size, Some(1));
    }
}
