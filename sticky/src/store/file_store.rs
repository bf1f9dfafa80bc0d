use crate::common::{DEFAULT_FILE_EXTENSION, TEMP_FILE_PREFIX};
use crate::errors::{ErrorKind, StickyError, StickyResult};
use crate::store::EntityStoreProvider;
use itertools::Itertools;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stores each entity as `<directory>/<entity><extension>`.
///
/// Writes go through [atomic_write], so a reader never observes a half
/// written document. Hidden files in the directory (temp files, the
/// metadata file) are never reported as entities.
#[derive(Debug, Clone)]
pub struct FileEntityStore {
    directory: PathBuf,
    extension: String,
}

impl FileEntityStore {
    /// Opens a store over `directory`, creating the directory if needed.
    pub fn new<P: Into<PathBuf>>(directory: P, extension: &str) -> StickyResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| {
            log::error!("Failed to create storage directory {:?}: {}", directory, e);
            StickyError::new_with_cause(
                &format!("Failed to create storage directory {:?}", directory),
                ErrorKind::IOFailure,
                e.into(),
            )
        })?;

        Ok(FileEntityStore {
            directory,
            extension: extension.to_string(),
        })
    }

    /// Opens a store over `directory` using the default `.json` extension.
    pub fn with_defaults<P: Into<PathBuf>>(directory: P) -> StickyResult<Self> {
        FileEntityStore::new(directory, DEFAULT_FILE_EXTENSION)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns the file path backing `entity`.
    ///
    /// # Errors
    /// [ErrorKind::IOFailure] if the name is empty, hidden, or could escape
    /// the storage directory.
    pub fn entity_path(&self, entity: &str) -> StickyResult<PathBuf> {
        validate_entity_name(entity)?;
        Ok(self.directory.join(format!("{}{}", entity, self.extension)))
    }

    fn entity_name_of(&self, path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with('.') {
            return None;
        }
        file_name
            .strip_suffix(self.extension.as_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}

impl EntityStoreProvider for FileEntityStore {
    fn read(&self, entity: &str) -> StickyResult<Option<Vec<u8>>> {
        let path = self.entity_path(entity)?;
        if !path.is_file() {
            return Ok(None);
        }

        fs::read(&path).map(Some).map_err(|e| {
            log::error!("Failed to read data file for {}: {}", entity, e);
            StickyError::new_with_cause(
                &format!("Failed to read data file for entity {}", entity),
                ErrorKind::IOFailure,
                e.into(),
            )
        })
    }

    fn write(&self, entity: &str, bytes: &[u8]) -> StickyResult<()> {
        let path = self.entity_path(entity)?;
        atomic_write(&path, bytes).map_err(|e| {
            log::error!("Failed to write data file for {}: {}", entity, e);
            StickyError::new_with_cause(
                &format!("Failed to write data file for entity {}", entity),
                ErrorKind::IOFailure,
                e,
            )
        })
    }

    fn rename(&self, old: &str, new: &str) -> StickyResult<()> {
        let source = self.entity_path(old)?;
        let target = self.entity_path(new)?;

        if !source.is_file() {
            log::error!("No data file to rename for {}", old);
            return Err(StickyError::new(
                &format!("No data file to rename for entity {}", old),
                ErrorKind::IOFailure,
            ));
        }

        if target.exists() {
            log::error!("Cannot rename {} to {}, target already exists", old, new);
            return Err(StickyError::new(
                &format!("Cannot rename entity {} to {}, target already exists", old, new),
                ErrorKind::IOFailure,
            ));
        }

        fs::rename(&source, &target).map_err(|e| {
            log::error!("Failed to rename {} to {}: {}", old, new, e);
            StickyError::new_with_cause(
                &format!("Failed to rename entity {} to {}", old, new),
                ErrorKind::IOFailure,
                e.into(),
            )
        })
    }

    fn exists(&self, entity: &str) -> bool {
        self.entity_path(entity)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn remove(&self, entity: &str) -> StickyResult<()> {
        let path = self.entity_path(entity)?;
        if path.is_file() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn entity_names(&self) -> StickyResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = self.entity_name_of(&path) {
                names.push(name);
            }
        }
        Ok(names.into_iter().sorted().collect())
    }
}

/// Rejects entity names that cannot safely become a file name.
pub fn validate_entity_name(entity: &str) -> StickyResult<()> {
    let invalid = entity.is_empty()
        || entity.starts_with('.')
        || entity.contains(['/', '\\', '\0']);

    if invalid {
        log::error!("Invalid entity name {:?}", entity);
        return Err(StickyError::new(
            &format!("Invalid entity name {:?}", entity),
            ErrorKind::IOFailure,
        ));
    }
    Ok(())
}

/// Replaces `path` with `bytes` so the file is either fully old or fully new.
///
/// The content goes to a uniquely named hidden file next to `path`, is
/// synced, and is then renamed over the target. The temp file is removed if
/// any step fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> StickyResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.exists() {
        fs::create_dir_all(&parent)?;
    }

    let temp_path = parent.join(format!("{}{}", TEMP_FILE_PREFIX, Uuid::new_v4()));
    let result = write_synced(&temp_path, bytes).and_then(|_| fs::rename(&temp_path, path));

    if let Err(e) = result {
        if temp_path.exists() {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                log::warn!("Failed to remove temp file {:?}: {}", temp_path, cleanup);
            }
        }
        return Err(e.into());
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    // force the content to disk before the rename publishes it
    file.sync_all()
}
