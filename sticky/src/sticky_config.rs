//! Configuration management for a Sticky store.

use crate::common::{DEFAULT_FILE_EXTENSION, DEFAULT_METADATA_FILE};
use crate::errors::{ErrorKind, StickyError, StickyResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Public interface for Sticky configuration.
///
/// Every value can be set once, before the store is opened. Unset values
/// fall back to their defaults.
///
/// # Examples
///
/// ```rust,ignore
/// use sticky::sticky_config::StickyConfig;
///
/// let config = StickyConfig::new();
/// config.set_storage_dir("/var/lib/app/data")?;
/// config.set_file_extension(".store")?;
/// assert_eq!(config.metadata_file(), ".sticky_metadata.json");
/// ```
#[derive(Clone)]
pub struct StickyConfig {
    /// The pointer to implementation. Uses Arc for cheap cloning and thread safety.
    inner: Arc<StickyConfigInner>,
}

impl Default for StickyConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StickyConfig {
    pub fn new() -> Self {
        StickyConfig {
            inner: Arc::new(StickyConfigInner::new()),
        }
    }

    /// Directory holding the entity files and the metadata file.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.inner.storage_dir.get().cloned()
    }

    pub fn set_storage_dir<P: AsRef<Path>>(&self, dir: P) -> StickyResult<()> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(config_error("Storage directory cannot be empty"));
        }
        self.inner
            .set_once(&self.inner.storage_dir, dir.to_path_buf(), "storage directory")
    }

    /// Extension appended to entity names to form file names. Defaults to `.json`.
    pub fn file_extension(&self) -> String {
        self.inner
            .file_extension
            .get()
            .cloned()
            .unwrap_or_else(|| DEFAULT_FILE_EXTENSION.to_string())
    }

    /// # Errors
    ///
    /// Returns error if already set, empty, or not starting with a dot.
    pub fn set_file_extension(&self, extension: &str) -> StickyResult<()> {
        if extension.len() < 2 || !extension.starts_with('.') {
            return Err(config_error(&format!(
                "File extension {:?} must start with a dot and name an extension",
                extension
            )));
        }
        if extension.contains(['/', '\\']) {
            return Err(config_error(&format!(
                "File extension {:?} cannot contain path separators",
                extension
            )));
        }
        self.inner
            .set_once(&self.inner.file_extension, extension.to_string(), "file extension")
    }

    /// Name of the metadata file inside the storage directory.
    pub fn metadata_file(&self) -> String {
        self.inner
            .metadata_file
            .get()
            .cloned()
            .unwrap_or_else(|| DEFAULT_METADATA_FILE.to_string())
    }

    /// # Errors
    ///
    /// Returns error if already set, not a plain file name, or not hidden.
    /// Entity listings skip hidden files, so a visible name would be listed
    /// and cleared as an entity.
    pub fn set_metadata_file(&self, name: &str) -> StickyResult<()> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(config_error(&format!(
                "Metadata file name {:?} must be a plain file name",
                name
            )));
        }
        if name.len() < 2 || !name.starts_with('.') {
            return Err(config_error(&format!(
                "Metadata file name {:?} must start with a dot",
                name
            )));
        }
        self.inner
            .set_once(&self.inner.metadata_file, name.to_string(), "metadata file")
    }

    /// Directory scanned by `Sticky::migrate_pending`.
    pub fn migration_dir(&self) -> Option<PathBuf> {
        self.inner.migration_dir.get().cloned()
    }

    pub fn set_migration_dir<P: AsRef<Path>>(&self, dir: P) -> StickyResult<()> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(config_error("Migration directory cannot be empty"));
        }
        self.inner
            .set_once(&self.inner.migration_dir, dir.to_path_buf(), "migration directory")
    }

    /// Whether entity files are written pretty printed. Defaults to `false`.
    pub fn pretty_print(&self) -> bool {
        self.inner.pretty_print.get().copied().unwrap_or(false)
    }

    pub fn set_pretty_print(&self, pretty: bool) -> StickyResult<()> {
        self.inner
            .set_once(&self.inner.pretty_print, pretty, "pretty print")
    }

    /// Path of the metadata file, if a storage directory is configured.
    pub fn metadata_path(&self) -> Option<PathBuf> {
        self.storage_dir().map(|dir| dir.join(self.metadata_file()))
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Freezes the configuration. Called once the store is opened.
    pub(crate) fn initialize(&self) {
        self.inner.configured.store(true, Ordering::Relaxed);
    }
}

/// Private implementation of Sticky configuration.
struct StickyConfigInner {
    /// Set once the store has been opened
    configured: AtomicBool,
    storage_dir: OnceLock<PathBuf>,
    file_extension: OnceLock<String>,
    metadata_file: OnceLock<String>,
    migration_dir: OnceLock<PathBuf>,
    pretty_print: OnceLock<bool>,
}

impl StickyConfigInner {
    fn new() -> Self {
        StickyConfigInner {
            configured: AtomicBool::from(false),
            storage_dir: OnceLock::new(),
            file_extension: OnceLock::new(),
            metadata_file: OnceLock::new(),
            migration_dir: OnceLock::new(),
            pretty_print: OnceLock::new(),
        }
    }

    fn set_once<T>(&self, cell: &OnceLock<T>, value: T, name: &str) -> StickyResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("The {} cannot be changed after initialization", name);
            return Err(config_error(&format!(
                "The {} cannot be changed after initialization",
                name
            )));
        }

        cell.set(value).map_err(|_| {
            log::error!("The {} is already set", name);
            config_error(&format!("The {} is already set", name))
        })
    }
}

fn config_error(message: &str) -> StickyError {
    StickyError::new(message, ErrorKind::ConfigError)
}
