//! On-disk layout of the media tree
//!
//! ```text
//! <root>/
//! ├── <entity>/
//! │   └── <media id>          generic media
//! └── avatars/
//!     └── <entity>/
//!         └── <media id>      avatars
//! ```
//!
//! Entity directories are created lazily on first upload with a
//! single-level `mkdir`; only the root and the shared `avatars/` parent
//! are created up front.

use mediastore_common::{AVATARS_DIR, EntityId, MediaId, MediaKind, STAGING_PREFIX};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Path resolver for the media tree
#[derive(Clone, Debug)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage root and the avatar parent directory
    pub async fn init(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.avatars_root()).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn avatars_root(&self) -> PathBuf {
        self.root.join(AVATARS_DIR)
    }

    /// `<root>/<entity>`
    pub fn media_dir(&self, entity: &EntityId) -> PathBuf {
        self.root.join(entity.as_str())
    }

    /// `<root>/avatars/<entity>`
    pub fn avatar_dir(&self, entity: &EntityId) -> PathBuf {
        self.avatars_root().join(entity.as_str())
    }

    pub fn dir_for(&self, entity: &EntityId, kind: MediaKind) -> PathBuf {
        match kind {
            MediaKind::Media => self.media_dir(entity),
            MediaKind::Avatar => self.avatar_dir(entity),
        }
    }

    pub fn file_path(&self, entity: &EntityId, media_id: &MediaId, kind: MediaKind) -> PathBuf {
        self.dir_for(entity, kind).join(media_id.as_str())
    }

    /// A fresh, uniquely named staging file inside `dir`.
    ///
    /// `MediaId` refuses the staging prefix, so no retrieval resolves here.
    pub fn staging_path(dir: &Path) -> PathBuf {
        dir.join(format!("{STAGING_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Create `dir` if it does not exist yet.
    ///
    /// Not recursive: the parent must already exist. Losing a creation race
    /// to another request counts as success. Returns whether this call
    /// created the directory.
    pub async fn ensure_dir(dir: &Path) -> io::Result<bool> {
        match tokio::fs::create_dir(dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if tokio::fs::metadata(dir).await?.is_dir() {
                    Ok(false)
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a directory", dir.display()),
                    ))
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str) -> EntityId {
        EntityId::new(id).unwrap()
    }

    #[test]
    fn test_media_and_avatar_dirs_are_separate() {
        let layout = StorageLayout::new("/srv/media");
        let alice = entity("alice@example.com");
        let id = MediaId::new("abc123").unwrap();

        assert_eq!(
            layout.file_path(&alice, &id, MediaKind::Media),
            PathBuf::from("/srv/media/alice@example.com/abc123")
        );
        assert_eq!(
            layout.file_path(&alice, &id, MediaKind::Avatar),
            PathBuf::from("/srv/media/avatars/alice@example.com/abc123")
        );
    }

    #[test]
    fn test_staging_paths_are_unique_and_hidden() {
        let dir = Path::new("/srv/media/alice");
        let a = StorageLayout::staging_path(dir);
        let b = StorageLayout::staging_path(dir);
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(dir));
        assert!(
            a.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(STAGING_PREFIX)
        );
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().join("root"));
        layout.init().await.unwrap();

        let dir = layout.avatar_dir(&entity("bob"));
        assert!(StorageLayout::ensure_dir(&dir).await.unwrap());
        assert!(!StorageLayout::ensure_dir(&dir).await.unwrap());
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_ensure_dir_is_not_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().join("never-created"));

        let err = StorageLayout::ensure_dir(&layout.media_dir(&entity("bob")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_ensure_dir_rejects_plain_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("taken");
        std::fs::write(&path, b"x").unwrap();

        assert!(StorageLayout::ensure_dir(&path).await.is_err());
    }
}
