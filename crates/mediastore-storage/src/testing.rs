//! Shared fixtures for the pipeline tests

use crate::form::tests::{BOUNDARY, body_stream, encode_form};
use crate::service::MediaService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediastore_common::checksum::compute_md5;
use mediastore_common::config::StorageConfig;
use mediastore_common::{Media, MetadataSource, MetadataSourceError, Result, SourceResult};
use mediastore_meta_store::MetaStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

/// MetaStore wrapper that records every `touch_last_viewed` call and can be
/// told to fail touches, record writes or avatar mapping writes
pub struct RecordingSource {
    pub inner: MetaStore,
    pub touches: Mutex<Vec<String>>,
    pub fail_touch: AtomicBool,
    pub fail_store: AtomicBool,
    pub fail_mapping: AtomicBool,
}

impl RecordingSource {
    pub fn touches(&self) -> Vec<String> {
        self.touches.lock().clone()
    }
}

#[async_trait]
impl MetadataSource for RecordingSource {
    async fn avatar_id_for(&self, entity_id: &str) -> SourceResult<String> {
        self.inner.avatar_id_for(entity_id).await
    }

    async fn mime_type_for(&self, media_id: &str) -> SourceResult<String> {
        self.inner.mime_type_for(media_id).await
    }

    async fn get_media(&self, media_id: &str) -> SourceResult<Media> {
        self.inner.get_media(media_id).await
    }

    async fn list_media(
        &self,
        entity_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> SourceResult<Vec<Media>> {
        self.inner.list_media(entity_id, since).await
    }

    async fn store_media(&self, media: &Media) -> SourceResult<()> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(MetadataSourceError::backend("store disabled"));
        }
        self.inner.store_media(media).await
    }

    async fn store_avatar_mapping(&self, media: &Media) -> SourceResult<()> {
        if self.fail_mapping.load(Ordering::SeqCst) {
            return Err(MetadataSourceError::backend("mapping disabled"));
        }
        self.inner.store_avatar_mapping(media).await
    }

    async fn delete_media(&self, media_id: &str) -> SourceResult<()> {
        self.inner.delete_media(media_id).await
    }

    async fn delete_avatar_mapping(&self, entity_id: &str) -> SourceResult<()> {
        self.inner.delete_avatar_mapping(entity_id).await
    }

    async fn touch_last_viewed(&self, media_id: &str) -> SourceResult<()> {
        self.touches.lock().push(media_id.to_string());
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(MetadataSourceError::backend("touch disabled"));
        }
        self.inner.touch_last_viewed(media_id).await
    }
}

pub struct Fixture {
    pub tmp: TempDir,
    pub source: Arc<RecordingSource>,
    pub service: MediaService,
}

impl Fixture {
    pub fn root(&self) -> std::path::PathBuf {
        self.tmp.path().join("media")
    }
}

pub async fn fixture() -> Fixture {
    fixture_with(|_| {}).await
}

pub async fn fixture_with(tweak: impl FnOnce(&mut StorageConfig)) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = StorageConfig::with_root(tmp.path().join("media"));
    config.spool_dir = Some(tmp.path().to_path_buf());
    tweak(&mut config);

    let source = Arc::new(RecordingSource {
        inner: MetaStore::open(tmp.path().join("meta.redb")).unwrap(),
        touches: Mutex::new(Vec::new()),
        fail_touch: AtomicBool::new(false),
        fail_store: AtomicBool::new(false),
        fail_mapping: AtomicBool::new(false),
    });
    let service = MediaService::open(&config, source.clone()).await.unwrap();

    Fixture {
        tmp,
        source,
        service,
    }
}

/// JSON body part for an upload of `payload`
pub fn media_json(id: &str, mime_type: &str, payload: &[u8]) -> String {
    serde_json::json!({
        "id": id,
        "mimeType": mime_type,
        "md5Checksum": compute_md5(payload),
    })
    .to_string()
}

/// Upload `payload` under `id` with a correct checksum
pub async fn upload(
    service: &MediaService,
    entity: &str,
    id: &str,
    payload: &[u8],
    is_avatar: bool,
) -> Result<Media> {
    let body = media_json(id, "image/jpeg", payload);
    upload_raw(service, entity, Some(&body), Some(payload), is_avatar).await
}

/// Upload an arbitrary combination of `body` and `file` parts
pub async fn upload_raw(
    service: &MediaService,
    entity: &str,
    body: Option<&str>,
    file: Option<&[u8]>,
    is_avatar: bool,
) -> Result<Media> {
    let mut parts: Vec<(&str, Option<&str>, &[u8])> = Vec::new();
    if let Some(body) = body {
        parts.push(("body", None, body.as_bytes()));
    }
    if let Some(file) = file {
        parts.push(("file", Some("upload.bin"), file));
    }
    let encoded = encode_form(&parts);
    service
        .insert_media(entity, body_stream(encoded, 256), BOUNDARY, is_avatar)
        .await
}
