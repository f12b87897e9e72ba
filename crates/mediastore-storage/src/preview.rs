//! Preview rendering
//!
//! A renderer may produce a scaled copy of a stored file. Returning
//! `None` means the original file is served as-is.

use async_trait::async_trait;
use mediastore_common::Result;
use std::path::{Path, PathBuf};

/// Produces bounded previews of stored media
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// Render `original` to fit within `max_height` x `max_width`.
    async fn render(
        &self,
        original: &Path,
        max_height: u32,
        max_width: u32,
    ) -> Result<Option<PathBuf>>;
}

/// Always serves the original file
#[derive(Clone, Copy, Debug, Default)]
pub struct FullResolution;

#[async_trait]
impl PreviewRenderer for FullResolution {
    async fn render(
        &self,
        _original: &Path,
        _max_height: u32,
        _max_width: u32,
    ) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_resolution_falls_back_to_original() {
        let rendered = FullResolution
            .render(Path::new("/srv/media/alice/abc123"), 64, 64)
            .await
            .unwrap();
        assert!(rendered.is_none());
    }
}
