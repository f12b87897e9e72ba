//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

// Key: media id, Value: bincode-encoded StoredMedia
pub const MEDIA: TableDefinition<&str, &[u8]> = TableDefinition::new("media");

// Key: entity id, Value: media id of the entity's avatar
pub const ENTITY_AVATARS: TableDefinition<&str, &str> = TableDefinition::new("entity_avatars");
