use crate::common::{get_current_time_or_zero, INITIAL_SCHEMA_VERSION, STORE_VERSION};
use crate::errors::{ErrorKind, StickyError, StickyResult};
use crate::store::atomic_write;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Access to the persisted schema version.
///
/// The version marks which migration files have already been applied. It is
/// read before a migration run and written once per fully persisted file.
pub trait SchemaVersionStore: Send + Sync {
    fn get(&self) -> StickyResult<u32>;

    fn set(&self, version: u32) -> StickyResult<()>;
}

/// Store metadata persisted next to the entity files.
///
/// # Fields
/// - `schema_version`: last applied migration version
/// - `store_version`: version of the on-disk layout
/// - `create_time`: unix milliseconds when the metadata was first written
/// - `update_time`: unix milliseconds of the last version change
///
/// Missing fields fall back to their defaults so older metadata files keep
/// loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreMetadata {
    pub schema_version: u32,
    pub store_version: String,
    pub create_time: u64,
    pub update_time: u64,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        StoreMetadata {
            schema_version: INITIAL_SCHEMA_VERSION,
            store_version: STORE_VERSION.to_string(),
            create_time: 0,
            update_time: 0,
        }
    }
}

impl StoreMetadata {
    /// Metadata for a store that has never been migrated.
    pub fn new() -> Self {
        let now = get_current_time_or_zero();
        StoreMetadata {
            create_time: now,
            update_time: now,
            ..StoreMetadata::default()
        }
    }
}

/// Schema version kept in a JSON metadata file.
///
/// An absent file means no migration ever ran, so [INITIAL_SCHEMA_VERSION]
/// is reported. Writes replace the file atomically.
#[derive(Debug, Clone)]
pub struct FileSchemaVersion {
    path: PathBuf,
}

impl FileSchemaVersion {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileSchemaVersion { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the full metadata, or `None` if the file does not exist yet.
    pub fn metadata(&self) -> StickyResult<Option<StoreMetadata>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path).map_err(|e| {
            log::error!("Failed to read store metadata {:?}: {}", self.path, e);
            StickyError::new_with_cause(
                &format!("Failed to read store metadata {:?}", self.path),
                ErrorKind::IOFailure,
                e.into(),
            )
        })?;

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            log::error!("Store metadata {:?} is corrupted: {}", self.path, e);
            StickyError::new_with_cause(
                &format!("Store metadata {:?} is corrupted", self.path),
                ErrorKind::MalformedFile,
                e.into(),
            )
        })
    }
}

impl SchemaVersionStore for FileSchemaVersion {
    fn get(&self) -> StickyResult<u32> {
        Ok(self
            .metadata()?
            .map(|metadata| metadata.schema_version)
            .unwrap_or(INITIAL_SCHEMA_VERSION))
    }

    fn set(&self, version: u32) -> StickyResult<()> {
        let mut metadata = self.metadata()?.unwrap_or_else(StoreMetadata::new);
        metadata.schema_version = version;
        metadata.update_time = get_current_time_or_zero();

        let bytes = serde_json::to_vec_pretty(&metadata).map_err(|e| {
            StickyError::new(
                &format!("Failed to encode store metadata: {}", e),
                ErrorKind::EncodingError,
            )
        })?;
        atomic_write(&self.path, &bytes)?;
        log::debug!("Schema version set to {} in {:?}", version, self.path);
        Ok(())
    }
}

/// Schema version held in memory, shared by all clones.
#[derive(Debug, Clone)]
pub struct InMemorySchemaVersion {
    version: Arc<AtomicU32>,
    writes: Arc<AtomicUsize>,
}

impl InMemorySchemaVersion {
    pub fn new(version: u32) -> Self {
        InMemorySchemaVersion {
            version: Arc::new(AtomicU32::new(version)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times `set` has been called.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for InMemorySchemaVersion {
    fn default() -> Self {
        InMemorySchemaVersion::new(INITIAL_SCHEMA_VERSION)
    }
}

impl SchemaVersionStore for InMemorySchemaVersion {
    fn get(&self) -> StickyResult<u32> {
        Ok(self.version.load(Ordering::Relaxed))
    }

    fn set(&self, version: u32) -> StickyResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.version.store(version, Ordering::Relaxed);
        Ok(())
    }
}
