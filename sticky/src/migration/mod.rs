//! Versioned schema migrations over stored entity documents.
//!
//! Records have no compile-time schema, so migrations are written as JSON
//! documents describing structural edits, and applied generically to every
//! record of the entities they name.
//!
//! # Migration Files
//!
//! A migration body is an object keyed by action name:
//!
//! ```text
//! {
//!   "renameEntity":   { "Country": "Nation" },
//!   "renameProperty": { "College": { "rank": "ranking" } },
//!   "newProperty":    { "College": { "address": { "zip": null } } },
//!   "removeProperty": { "College": { "info": ["score", "notes"] } }
//! }
//! ```
//!
//! The version of a file is supplied out of band, either by the caller
//! ([MigrationFile::inline]) or by its file name (`2.json`, `v3_add_rank.json`).
//!
//! # Migration Process
//!
//! Files run in ascending version order, and only when their version is
//! greater than the stored schema version. Each file goes through:
//! 1. Load: the body is read and parsed as JSON
//! 2. Parse: the body is flattened into [MigrationTask]s
//! 3. Execute: tasks are applied in memory to a [StagingStore]
//! 4. Persist: staged collections are written, then entity renames run
//! 5. Advance: the schema version is set to the file's version
//!
//! # Atomicity
//!
//! Each entity file is replaced atomically and nothing is written until
//! every task of a file has executed. Writes of different entities are not
//! one transaction: if a later write fails, earlier entities keep their new
//! content while the schema version stays behind.

mod action;
mod executor;
mod file;
mod manager;
mod parser;
pub mod resolver;

pub use action::*;
pub use executor::{EntityRename, MigrationExecutor, MigrationPlan, StagingStore};
pub use file::*;
pub use manager::*;
pub use parser::{classify, flatten, parse_tasks};
