//! Media service handle
//!
//! `MediaService` is built once at startup and shared by reference (or by
//! `Arc`) with every request. It owns no per-request state.

use crate::form::FormLimits;
use crate::layout::StorageLayout;
use crate::preview::{FullResolution, PreviewRenderer};
use crate::upload::CommitLocks;
use mediastore_common::config::StorageConfig;
use mediastore_common::{MetadataSource, Result};
use std::sync::Arc;
use tracing::info;

/// Upload and retrieval pipelines over one media tree
#[derive(Clone)]
pub struct MediaService {
    pub(crate) layout: StorageLayout,
    pub(crate) source: Arc<dyn MetadataSource>,
    pub(crate) limits: FormLimits,
    pub(crate) preview: Arc<dyn PreviewRenderer>,
    pub(crate) commit_locks: Arc<CommitLocks>,
}

impl MediaService {
    /// Validate `config`, create the storage root and wire up `source`.
    pub async fn open(config: &StorageConfig, source: Arc<dyn MetadataSource>) -> Result<Self> {
        config.validate()?;
        let layout = StorageLayout::new(&config.root);
        layout.init().await?;

        info!("Media storage ready at {}", config.root.display());

        Ok(Self {
            layout,
            source,
            limits: FormLimits::from(config),
            preview: Arc::new(FullResolution),
            commit_locks: Arc::new(CommitLocks::default()),
        })
    }

    /// Replace the preview renderer
    #[must_use]
    pub fn with_preview_renderer(mut self, renderer: Arc<dyn PreviewRenderer>) -> Self {
        self.preview = renderer;
        self
    }

    pub fn limits(&self) -> &FormLimits {
        &self.limits
    }
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService")
            .field("root", &self.layout.root())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
