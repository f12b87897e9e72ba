//! mediastore Common - Shared types and utilities
//!
//! This crate provides the media record, identifier validation, error
//! definitions, checksum helpers, configuration and the metadata source
//! trait used across all mediastore components.

pub mod checksum;
pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use checksum::FileDigest;
pub use config::Config;
pub use error::{Error, Result};
pub use source::{MetadataSource, MetadataSourceError, SourceResult};
pub use types::*;
