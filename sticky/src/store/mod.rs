//! Entity storage collaborators.
//!
//! Every entity is persisted as one JSON array document. The migration
//! engine never touches the filesystem directly; it talks to an
//! [EntityStoreProvider] through the [EntityStore] wrapper.
//!
//! # Providers
//!
//! - [FileEntityStore]: one file per entity under a storage directory, with
//!   atomic per-entity writes
//! - [memory::InMemoryEntityStore]: a map of entity name to bytes, used for
//!   isolated tests and by embedders that keep data elsewhere

mod entity_store;
mod file_store;
pub mod memory;

pub use entity_store::*;
pub use file_store::*;
