use crate::errors::{ErrorKind, StickyError, StickyResult};
use crate::metadata::{FileSchemaVersion, SchemaVersionStore};
use crate::sticky::Sticky;
use crate::sticky_config::StickyConfig;
use crate::store::{EntityStore, EntityStoreProvider, FileEntityStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builder for opening a [Sticky] store.
///
/// `StickyBuilder` provides a fluent API for configuring the store. It
/// captures the first configuration error and reports it from [open].
///
/// By default entities live in files under the storage directory and the
/// schema version in a metadata file next to them. Either collaborator can
/// be replaced, for example with in-memory implementations in tests.
///
/// # Examples
///
/// ```rust,ignore
/// use sticky::sticky::Sticky;
///
/// let store = Sticky::builder()
///     .storage_dir("/var/lib/app/data")
///     .migration_dir("/var/lib/app/migrations")
///     .open()?;
/// let outcomes = store.migrate_pending()?;
/// ```
///
/// [open]: StickyBuilder::open
#[derive(Default)]
pub struct StickyBuilder {
    error: Option<StickyError>,
    config: StickyConfig,
    entity_store: Option<EntityStore>,
    version_store: Option<Arc<dyn SchemaVersionStore>>,
}

impl StickyBuilder {
    pub fn new() -> Self {
        StickyBuilder::default()
    }

    /// Sets the directory holding entity files and the metadata file.
    pub fn storage_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_storage_dir(dir) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Sets the extension of entity files, for example `.json`.
    pub fn file_extension(mut self, extension: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_file_extension(extension) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Sets the name of the metadata file inside the storage directory.
    pub fn metadata_file(mut self, name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_metadata_file(name) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Sets the directory scanned by [Sticky::migrate_pending].
    pub fn migration_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_migration_dir(dir) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn pretty_print(mut self, pretty: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_pretty_print(pretty) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Uses `provider` instead of files under the storage directory.
    pub fn entity_store<T: EntityStoreProvider + 'static>(mut self, provider: T) -> Self {
        self.entity_store = Some(EntityStore::new(provider));
        self
    }

    /// Uses `store` instead of the metadata file to keep the schema version.
    pub fn version_store<T: SchemaVersionStore + 'static>(mut self, store: T) -> Self {
        self.version_store = Some(Arc::new(store));
        self
    }

    /// Opens the store with the configured settings.
    ///
    /// # Errors
    ///
    /// - the first error captured while configuring
    /// - [ErrorKind::ConfigError] if a file backed collaborator is needed
    ///   but no storage directory is set
    /// - [ErrorKind::IOFailure] if the storage directory cannot be created
    pub fn open(self) -> StickyResult<Sticky> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let config = self.config;
        let entity_store = match self.entity_store {
            Some(store) => store,
            None => {
                let dir = require_storage_dir(&config)?;
                EntityStore::new(FileEntityStore::new(dir, &config.file_extension())?)
            }
        };

        let version_store: Arc<dyn SchemaVersionStore> = match self.version_store {
            Some(store) => store,
            None => {
                let dir = require_storage_dir(&config)?;
                Arc::new(FileSchemaVersion::new(dir.join(config.metadata_file())))
            }
        };

        config.initialize();
        log::debug!("Sticky store opened");
        Ok(Sticky::new(config, entity_store, version_store))
    }
}

fn require_storage_dir(config: &StickyConfig) -> StickyResult<PathBuf> {
    config.storage_dir().ok_or_else(|| {
        log::error!("No storage directory is configured");
        StickyError::new(
            "A storage directory is required for file backed storage",
            ErrorKind::ConfigError,
        )
    })
}
