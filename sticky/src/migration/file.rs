use crate::common::{JsonValue, MIGRATION_FILE_EXTENSION};
use crate::errors::{ErrorKind, StickyError, StickyResult};
use itertools::Itertools;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// `2.json`, `v3_add_rank.json`, `V10-rename.json`, `4.split.json`
static VERSIONED_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[vV]?(\d+)(?:[_\-.].*)?$"));

/// Where the body of a migration file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationSource {
    /// A JSON file on disk.
    Path(PathBuf),
    /// A body held in memory, usually compiled into the binary.
    Inline(String),
}

/// A versioned migration body.
///
/// The version is supplied out of band, either by the caller or by the file
/// name convention understood by [MigrationFile::from_path].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: u32,
    pub location: MigrationSource,
}

impl MigrationFile {
    pub fn new(version: u32, location: MigrationSource) -> Self {
        MigrationFile { version, location }
    }

    /// A migration whose body is the given JSON text.
    pub fn inline<S: Into<String>>(version: u32, body: S) -> Self {
        MigrationFile::new(version, MigrationSource::Inline(body.into()))
    }

    /// A migration file on disk whose version is taken from its name.
    ///
    /// # Errors
    /// [ErrorKind::MalformedFile] if the file name carries no version.
    pub fn from_path<P: AsRef<Path>>(path: P) -> StickyResult<Self> {
        let path = path.as_ref();
        match version_of(path)? {
            Some(version) => Ok(MigrationFile::new(
                version,
                MigrationSource::Path(path.to_path_buf()),
            )),
            None => {
                log::error!("No version in migration file name {:?}", path);
                Err(StickyError::new(
                    &format!("No version in migration file name {:?}", path),
                    ErrorKind::MalformedFile,
                ))
            }
        }
    }

    /// Reads the raw body.
    ///
    /// # Errors
    /// [ErrorKind::MalformedFile] if the file cannot be read.
    pub fn read_body(&self) -> StickyResult<Vec<u8>> {
        match &self.location {
            MigrationSource::Inline(body) => Ok(body.as_bytes().to_vec()),
            MigrationSource::Path(path) => fs::read(path).map_err(|e| {
                log::error!("Failed to read migration file {:?}: {}", path, e);
                StickyError::new_with_cause(
                    &format!("Failed to read migration file {:?}", path),
                    ErrorKind::MalformedFile,
                    e.into(),
                )
            }),
        }
    }

    /// Reads and parses the body as JSON.
    pub fn load(&self) -> StickyResult<JsonValue> {
        let bytes = self.read_body()?;
        JsonValue::from_slice(&bytes).map_err(|e| {
            log::error!("Migration {} is not valid JSON: {}", self, e);
            StickyError::new_with_cause(
                &format!("Migration {} is not valid JSON", self),
                ErrorKind::MalformedFile,
                e,
            )
        })
    }
}

impl Display for MigrationFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            MigrationSource::Path(path) => write!(f, "v{} ({})", self.version, path.display()),
            MigrationSource::Inline(_) => write!(f, "v{} (inline)", self.version),
        }
    }
}

/// Extracts the version from a migration file name.
///
/// Only `.json` files qualify. The stem must start with an optional `v` and
/// a decimal number, optionally followed by `_`, `-` or `.` and free text.
pub fn version_of(path: &Path) -> StickyResult<Option<u32>> {
    let pattern = VERSIONED_NAME.as_ref().map_err(|e| {
        StickyError::new(
            &format!("Invalid migration file pattern: {}", e),
            ErrorKind::InternalError,
        )
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MIGRATION_FILE_EXTENSION));
    if !is_json {
        return Ok(None);
    }

    let version = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| pattern.captures(stem))
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse::<u32>().ok());
    Ok(version)
}

/// Lists the migration files in `dir`, sorted by ascending version.
///
/// Files whose names carry no version are skipped. Hidden files and
/// subdirectories are ignored.
pub fn discover_migrations<P: AsRef<Path>>(dir: P) -> StickyResult<Vec<MigrationFile>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        log::error!("Failed to list migration directory {:?}: {}", dir, e);
        StickyError::new_with_cause(
            &format!("Failed to list migration directory {:?}", dir),
            ErrorKind::IOFailure,
            e.into(),
        )
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if hidden || !path.is_file() {
            continue;
        }

        match version_of(&path)? {
            Some(version) => found.push((version, path)),
            None => log::debug!("Skipping {:?}, not a versioned migration file", path),
        }
    }

    for version in found.iter().map(|(version, _)| *version).duplicates() {
        log::warn!(
            "More than one migration file has version {}, only the first will run",
            version
        );
    }

    Ok(found
        .into_iter()
        .sorted()
        .map(|(version, path)| MigrationFile::new(version, MigrationSource::Path(path)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = env::temp_dir().join(format!("sticky-migrations-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_version_of() {
        let cases = [
            ("2.json", Some(2)),
            ("v3_add_rank.json", Some(3)),
            ("V10-rename.json", Some(10)),
            ("4.split.json", Some(4)),
            ("007.JSON", Some(7)),
            ("notes.json", None),
            ("v.json", None),
            ("3abc.json", None),
            ("2.txt", None),
            ("99999999999.json", None),
        ];
        for (name, expected) in cases {
            assert_eq!(version_of(Path::new(name)).unwrap(), expected, "name {}", name);
        }
    }

    #[test]
    fn test_from_path() {
        let file = MigrationFile::from_path("/data/migrations/v2_rank.json").unwrap();
        assert_eq!(file.version, 2);
        assert_eq!(
            file.location,
            MigrationSource::Path(PathBuf::from("/data/migrations/v2_rank.json"))
        );
    }

    #[test]
    fn test_from_path_without_version() {
        let err = MigrationFile::from_path("/data/migrations/rank.json").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedFile);
    }

    #[test]
    fn test_inline_load() {
        let file = MigrationFile::inline(5, r#"{"renameEntity": {"Country": "Nation"}}"#);
        let body = file.load().unwrap();
        assert!(body.as_object().unwrap().contains_key("renameEntity"));
        assert_eq!(file.to_string(), "v5 (inline)");
    }

    #[test]
    fn test_load_invalid_json() {
        let err = MigrationFile::inline(1, "{\"renameEntity\": ").load().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedFile);
    }

    #[test]
    fn test_read_missing_file() {
        let file = MigrationFile::new(1, MigrationSource::Path(PathBuf::from("/nowhere/1.json")));
        let err = file.read_body().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::MalformedFile);
    }

    #[test]
    fn test_discover_sorts_and_filters() {
        let dir = temp_dir();
        fs::write(dir.join("10_late.json"), "{}").unwrap();
        fs::write(dir.join("2.json"), "{}").unwrap();
        fs::write(dir.join("v3-rank.json"), "{}").unwrap();
        fs::write(dir.join("readme.md"), "x").unwrap();
        fs::write(dir.join("draft.json"), "{}").unwrap();
        fs::write(dir.join(".5.json"), "{}").unwrap();
        fs::create_dir(dir.join("7.json")).unwrap();

        let files = discover_migrations(&dir).unwrap();
        let versions: Vec<u32> = files.iter().map(|file| file.version).collect();
        assert_eq!(versions, vec![2, 3, 10]);
        assert_eq!(files[0].location, MigrationSource::Path(dir.join("2.json")));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = env::temp_dir().join(format!("sticky-none-{}", Uuid::new_v4()));
        let err = discover_migrations(&dir).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IOFailure);
    }
}
