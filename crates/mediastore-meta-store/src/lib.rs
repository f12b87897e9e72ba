//! mediastore Metadata Store - persistent media records
//!
//! This crate implements the `MetadataSource` trait on top of an embedded
//! redb database: one table of media records and one table mapping each
//! entity to its avatar.

pub mod store;
pub mod tables;
pub mod types;

// Re-exports
pub use store::{MetaStore, MetaStoreError, MetaStoreResult};
pub use types::StoredMedia;
