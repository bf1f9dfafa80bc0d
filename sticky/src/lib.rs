//! # Sticky - File-Backed JSON Entity Store
//!
//! Sticky keeps application data as plain JSON files, one file per entity,
//! each holding an array of records. Records have no compile-time schema, so
//! their shape evolves through versioned migration documents that edit every
//! record of an entity in place.
//!
//! ## Key Features
//!
//! - **Plain files**: Every entity is a readable JSON array on disk
//! - **Versioned migrations**: JSON documents rename, add and remove properties and rename entities
//! - **Safe writes**: Entity and metadata files are replaced atomically
//! - **Pluggable storage**: Entity and schema version stores are traits with in-memory implementations
//! - **Clean API**: PIMPL pattern keeps clones cheap and state shared
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sticky::sticky::Sticky;
//! use sticky::migration::MigrationFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Sticky::builder()
//!     .storage_dir("/var/lib/app/data")
//!     .migration_dir("/var/lib/app/migrations")
//!     .open()?;
//!
//! // Run every migration file newer than the stored schema version
//! for outcome in store.migrate_pending()? {
//!     println!("{}", outcome);
//! }
//!
//! // Or supply a migration body directly
//! store.migrate(vec![MigrationFile::inline(
//!     7,
//!     r#"{"newProperty": {"College": {"address": {"zip": null}}}}"#,
//! )])?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - JSON value model, constants and utilities
//! - [`errors`] - Error types and result definitions
//! - [`metadata`] - Schema version persistence
//! - [`migration`] - Migration files, parsing and execution
//! - [`store`] - Entity storage abstractions and implementations
//! - [`sticky`] - Store facade
//! - [`sticky_builder`] - Builder for opening a store
//! - [`sticky_config`] - Store configuration

pub mod common;
pub mod errors;
pub mod metadata;
pub mod migration;
pub mod sticky;
pub mod sticky_builder;
pub mod sticky_config;
pub mod store;
