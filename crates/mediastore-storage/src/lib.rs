//! mediastore Storage - media ingestion and retrieval
//!
//! This crate stores uploaded media on a local filesystem tree and
//! records their metadata through a [`MetadataSource`]:
//! - Multipart upload parsing with bounded memory use
//! - Checksum-verified, staged writes under `<root>/<entity>` and
//!   `<root>/avatars/<entity>`
//! - Retrieval with removal of records whose file has disappeared
//!
//! [`MetadataSource`]: mediastore_common::MetadataSource

pub mod download;
pub mod form;
pub mod layout;
pub mod preview;
pub mod service;
pub mod upload;

#[cfg(test)]
mod testing;

pub use download::MediaHandle;
pub use form::{FormLimits, FormPart, MultipartForm, parse_boundary};
pub use layout::StorageLayout;
pub use preview::{FullResolution, PreviewRenderer};
pub use service::MediaService;
