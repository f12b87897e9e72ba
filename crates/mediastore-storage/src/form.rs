//! Multipart upload form
//!
//! An upload body is split into named parts. Each part is buffered in
//! memory until it grows past the configured threshold, after which it is
//! spooled to a temporary file that is removed when the part is dropped.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use mediastore_common::config::StorageConfig;
use mediastore_common::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Name of the part carrying the JSON media description
pub const BODY_FIELD: &str = "body";
/// Name of the part carrying the binary content
pub const FILE_FIELD: &str = "file";

/// Buffering limits applied while parsing a form
#[derive(Clone, Debug)]
pub struct FormLimits {
    /// Parts larger than this are spooled to disk
    pub memory_threshold: usize,
    /// Parts larger than this are rejected
    pub max_part_size: u64,
    /// Where spooled parts are written
    pub spool_dir: PathBuf,
}

impl From<&StorageConfig> for FormLimits {
    fn from(config: &StorageConfig) -> Self {
        Self {
            memory_threshold: config.memory_threshold,
            max_part_size: config.max_upload_size,
            spool_dir: config.spool_dir(),
        }
    }
}

/// Content of a part
#[derive(Debug)]
pub enum PartData {
    Memory(Bytes),
    Spooled(NamedTempFile),
}

/// One named part of a multipart form
#[derive(Debug)]
pub struct FormPart {
    pub(crate) name: String,
    pub(crate) file_name: Option<String>,
    pub(crate) size: u64,
    pub(crate) data: PartData,
}

impl FormPart {
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub const fn size(&self) -> u64 {
        self.size
    }

    pub const fn is_spooled(&self) -> bool {
        matches!(self.data, PartData::Spooled(_))
    }

    /// Part content as UTF-8 text.
    ///
    /// Invalid UTF-8 is a malformed part wherever the content is buffered.
    pub async fn read_text(&self) -> Result<String> {
        let bytes = match &self.data {
            PartData::Memory(bytes) => bytes.to_vec(),
            PartData::Spooled(file) => tokio::fs::read(file.path()).await?,
        };
        String::from_utf8(bytes)
            .map_err(|e| Error::multipart(format!("part '{}' is not UTF-8: {e}", self.name)))
    }

    /// Write the part content to `path`, replacing any existing file.
    ///
    /// Returns the number of bytes written.
    pub async fn write_to(&self, path: &Path) -> io::Result<u64> {
        match &self.data {
            PartData::Memory(bytes) => {
                let mut file = tokio::fs::File::create(path).await?;
                file.write_all(bytes).await?;
                file.sync_all().await?;
                Ok(bytes.len() as u64)
            }
            PartData::Spooled(spooled) => {
                let written = tokio::fs::copy(spooled.path(), path).await?;
                tokio::fs::File::open(path).await?.sync_all().await?;
                Ok(written)
            }
        }
    }
}

/// Parsed multipart form
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub(crate) parts: Vec<FormPart>,
}

impl MultipartForm {
    /// Parse a `multipart/form-data` body.
    ///
    /// Unnamed parts are drained and dropped.
    pub async fn parse<S, O, E>(body: S, boundary: &str, limits: &FormLimits) -> Result<Self>
    where
        S: Stream<Item = std::result::Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let mut multipart = multer::Multipart::new(body, boundary.to_string());
        let mut parts = Vec::new();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| Error::multipart(format!("failed to parse multipart field: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                while field
                    .chunk()
                    .await
                    .map_err(|e| Error::multipart(format!("failed draining part: {e}")))?
                    .is_some()
                {}
                continue;
            };
            let file_name = field.file_name().map(str::to_string);

            let mut sink = PartSink::new(limits);
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| Error::multipart(format!("failed reading part '{name}': {e}")))?
            {
                sink.push(&chunk).await?;
            }
            let (size, data) = sink.finish().await?;

            debug!(
                "Parsed form part '{}' ({} bytes, spooled={})",
                name,
                size,
                matches!(data, PartData::Spooled(_))
            );
            parts.push(FormPart {
                name,
                file_name,
                size,
                data,
            });
        }

        Ok(Self { parts })
    }

    /// Remove and return the first part named `name`
    pub fn take_part(&mut self, name: &str) -> Option<FormPart> {
        let index = self.parts.iter().position(|p| p.name == name)?;
        Some(self.parts.remove(index))
    }
}

/// Accumulates one part, switching from memory to a spool file once the
/// threshold is crossed
struct PartSink<'a> {
    limits: &'a FormLimits,
    size: u64,
    buffer: BytesMut,
    spool: Option<(NamedTempFile, tokio::fs::File)>,
}

impl<'a> PartSink<'a> {
    fn new(limits: &'a FormLimits) -> Self {
        Self {
            limits,
            size: 0,
            buffer: BytesMut::new(),
            spool: None,
        }
    }

    async fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.size += chunk.len() as u64;
        if self.size > self.limits.max_part_size {
            return Err(Error::EntityTooLarge {
                max_size: self.limits.max_part_size,
            });
        }

        if let Some((_, file)) = self.spool.as_mut() {
            file.write_all(chunk).await?;
            return Ok(());
        }

        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > self.limits.memory_threshold {
            let tmp = NamedTempFile::new_in(&self.limits.spool_dir)?;
            let mut file = tokio::fs::File::from_std(tmp.as_file().try_clone()?);
            file.write_all(&self.buffer).await?;
            self.buffer.clear();
            self.spool = Some((tmp, file));
        }
        Ok(())
    }

    async fn finish(self) -> Result<(u64, PartData)> {
        match self.spool {
            Some((tmp, mut file)) => {
                file.flush().await?;
                Ok((self.size, PartData::Spooled(tmp)))
            }
            None => Ok((self.size, PartData::Memory(self.buffer.freeze()))),
        }
    }
}

/// Extract the boundary from a `multipart/form-data` content type
pub fn parse_boundary(content_type: &str) -> Result<String> {
    multer::parse_boundary(content_type)
        .map_err(|e| Error::multipart(format!("invalid content type: {e}")))
}
