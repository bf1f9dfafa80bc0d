use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::{env, panic};
use sticky::errors::{ErrorKind, StickyError, StickyResult};
use sticky::migration::MigrationFile;
use sticky::sticky::Sticky;

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs even when the test body fails or panics, so temporary
/// directories do not pile up.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> StickyResult<()>,
    B: Fn() -> StickyResult<TestContext>,
    A: Fn(TestContext) -> StickyResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let test_ctx = ctx.clone();
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| test(test_ctx)));

    if let Err(e) = after(ctx) {
        log::warn!("After run failed: {:?}", e);
    }

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => panic!("Test failed: {:?}", e),
        Err(panic_err) => panic::resume_unwind(panic_err),
    }
}

/// A file-backed store under a fresh temporary directory.
///
/// Entity files live in `<path>/data`, migration files in `<path>/migrations`.
#[derive(Clone)]
pub struct TestContext {
    path: PathBuf,
    sticky: Sticky,
}

impl TestContext {
    pub fn new(path: PathBuf, sticky: Sticky) -> Self {
        Self { path, sticky }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sticky(&self) -> Sticky {
        self.sticky.clone()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path.join("data")
    }

    pub fn migration_dir(&self) -> PathBuf {
        self.path.join("migrations")
    }

    pub fn entity_path(&self, entity: &str) -> PathBuf {
        self.data_dir().join(format!("{}.json", entity))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir().join(".sticky_metadata.json")
    }

    /// Writes `records` as the content of `entity`.
    pub fn write_entity(&self, entity: &str, records: Value) -> StickyResult<()> {
        fs::write(self.entity_path(entity), records.to_string())?;
        Ok(())
    }

    /// Writes raw text as the content of `entity`.
    pub fn write_entity_raw(&self, entity: &str, content: &str) -> StickyResult<()> {
        fs::write(self.entity_path(entity), content)?;
        Ok(())
    }

    pub fn read_entity(&self, entity: &str) -> StickyResult<Value> {
        let bytes = fs::read(self.entity_path(entity))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn read_entity_bytes(&self, entity: &str) -> StickyResult<Vec<u8>> {
        Ok(fs::read(self.entity_path(entity))?)
    }

    pub fn entity_exists(&self, entity: &str) -> bool {
        self.entity_path(entity).is_file()
    }

    /// Writes a migration file named `file_name` into the migration directory.
    pub fn write_migration(&self, file_name: &str, body: Value) -> StickyResult<PathBuf> {
        let path = self.migration_dir().join(file_name);
        fs::write(&path, body.to_string())?;
        Ok(path)
    }

    /// Builds an inline migration file from a JSON body.
    pub fn migration(&self, version: u32, body: Value) -> MigrationFile {
        MigrationFile::inline(version, body.to_string())
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("sticky-{}", id))
}

pub fn create_test_context() -> StickyResult<TestContext> {
    let path = random_path();
    if path.exists() {
        let _ = fs::remove_dir_all(&path);
    }
    log::debug!("Creating test context in {:?}", path);

    let migration_dir = path.join("migrations");
    fs::create_dir_all(&migration_dir)?;

    let sticky = Sticky::builder()
        .storage_dir(path.join("data"))
        .migration_dir(&migration_dir)
        .open()?;

    if !path.join("data").is_dir() {
        return Err(StickyError::new(
            "Storage directory was not created",
            ErrorKind::InternalError,
        ));
    }

    Ok(TestContext::new(path, sticky))
}

pub fn cleanup(ctx: TestContext) -> StickyResult<()> {
    let path = ctx.path();
    if !path.exists() {
        return Ok(());
    }

    if let Err(e) = fs::remove_dir_all(path) {
        // Left for the OS to reclaim
        log::warn!("Failed to remove test directory {:?}: {:?}", path, e);
    }
    Ok(())
}
