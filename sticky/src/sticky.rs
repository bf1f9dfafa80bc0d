use crate::errors::{ErrorKind, StickyError, StickyResult};
use crate::metadata::SchemaVersionStore;
use crate::migration::{discover_migrations, MigrationFile, MigrationManager, MigrationOutcome};
use crate::sticky_builder::StickyBuilder;
use crate::sticky_config::StickyConfig;
use crate::store::{EntityStore, EntityStoreProvider};
use std::sync::Arc;

/// A file-backed entity store with versioned schema migrations.
///
/// `Sticky` bundles the configuration with its two collaborators: the
/// [EntityStore] holding one JSON array document per entity, and the
/// [SchemaVersionStore] remembering which migrations already ran.
///
/// Clones are cheap and share the same collaborators. Migrations expect
/// exclusive access to the entity files while they run.
///
/// # Examples
///
/// ```rust,ignore
/// use sticky::sticky::Sticky;
/// use sticky::migration::MigrationFile;
///
/// let store = Sticky::builder().storage_dir("/var/lib/app/data").open()?;
/// let outcomes = store.migrate(vec![MigrationFile::inline(
///     2,
///     r#"{"renameProperty": {"College": {"rank": "ranking"}}}"#,
/// )])?;
/// assert!(outcomes[0].is_applied());
/// assert_eq!(store.schema_version()?, 2);
/// ```
#[derive(Clone)]
pub struct Sticky {
    inner: Arc<StickyInner>,
}

impl Sticky {
    /// Creates a new [StickyBuilder] with default configuration.
    pub fn builder() -> StickyBuilder {
        StickyBuilder::new()
    }

    pub(crate) fn new(
        config: StickyConfig,
        entity_store: EntityStore,
        version_store: Arc<dyn SchemaVersionStore>,
    ) -> Self {
        Sticky {
            inner: Arc::new(StickyInner {
                config,
                entity_store,
                version_store,
            }),
        }
    }

    pub fn config(&self) -> StickyConfig {
        self.inner.config.clone()
    }

    /// The entity storage collaborator.
    pub fn entity_store(&self) -> EntityStore {
        self.inner.entity_store.clone()
    }

    /// The schema version currently persisted.
    pub fn schema_version(&self) -> StickyResult<u32> {
        self.inner.version_store.get()
    }

    /// Returns `true` if a migration file with `version` would run now.
    pub fn needs_migration(&self, version: u32) -> StickyResult<bool> {
        Ok(MigrationManager::needs_run(version, self.schema_version()?))
    }

    /// Runs `files` in version order and reports one outcome per file.
    ///
    /// # Errors
    ///
    /// Only a failure to read the current schema version is returned as an
    /// error; failures of individual files are reported in their outcomes.
    pub fn migrate(&self, files: Vec<MigrationFile>) -> StickyResult<Vec<MigrationOutcome>> {
        self.migration_manager().run(files)
    }

    /// Discovers the migration files in the configured migration directory
    /// and runs them.
    ///
    /// # Errors
    ///
    /// - [ErrorKind::ConfigError] if no migration directory is configured
    /// - [ErrorKind::IOFailure] if the directory cannot be listed
    pub fn migrate_pending(&self) -> StickyResult<Vec<MigrationOutcome>> {
        let dir = self.inner.config.migration_dir().ok_or_else(|| {
            log::error!("No migration directory is configured");
            StickyError::new("No migration directory is configured", ErrorKind::ConfigError)
        })?;

        let files = discover_migrations(&dir)?;
        log::info!("Found {} migration files in {:?}", files.len(), dir);
        self.migrate(files)
    }

    /// Removes every entity document. The schema version is kept.
    pub fn clear(&self) -> StickyResult<()> {
        self.inner.entity_store.clear()
    }

    fn migration_manager(&self) -> MigrationManager {
        MigrationManager::new(
            self.inner.entity_store.clone(),
            self.inner.version_store.clone(),
            self.inner.config.pretty_print(),
        )
    }
}

struct StickyInner {
    config: StickyConfig,
    entity_store: EntityStore,
    version_store: Arc<dyn SchemaVersionStore>,
}
