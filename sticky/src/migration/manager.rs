use super::executor::{MigrationExecutor, MigrationPlan};
use super::file::MigrationFile;
use super::parser::parse_tasks;
use crate::errors::{StickyError, StickyResult};
use crate::metadata::SchemaVersionStore;
use crate::store::{encode_collection, EntityStore, EntityStoreProvider};
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// What happened to one migration file during a run.
#[derive(Debug, Clone)]
pub enum MigrationStatus {
    /// Every write succeeded and the schema version now equals the file's.
    Applied {
        entities_written: usize,
        entities_renamed: usize,
    },
    /// The file's version is not above the current schema version.
    Skipped,
    /// The file was abandoned and the schema version left untouched.
    Failed(StickyError),
}

/// Result of processing one migration file.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub version: u32,
    pub status: MigrationStatus,
}

impl MigrationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, MigrationStatus::Applied { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, MigrationStatus::Skipped)
    }

    pub fn error(&self) -> Option<&StickyError> {
        match &self.status {
            MigrationStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for MigrationOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            MigrationStatus::Applied {
                entities_written,
                entities_renamed,
            } => write!(
                f,
                "v{} applied ({} written, {} renamed)",
                self.version, entities_written, entities_renamed
            ),
            MigrationStatus::Skipped => write!(f, "v{} skipped", self.version),
            MigrationStatus::Failed(err) => {
                write!(f, "v{} failed: {} ({})", self.version, err, err.kind())
            }
        }
    }
}

/// Drives migration files through load, parse, execute, persist and advance.
///
/// Files run strictly in ascending version order. A file whose version is
/// not greater than the stored schema version is skipped without being read.
/// A failing file never advances the version; the run moves on to the next
/// file.
pub struct MigrationManager {
    store: EntityStore,
    version_store: Arc<dyn SchemaVersionStore>,
    pretty_print: bool,
}

impl MigrationManager {
    pub fn new(
        store: EntityStore,
        version_store: Arc<dyn SchemaVersionStore>,
        pretty_print: bool,
    ) -> Self {
        MigrationManager {
            store,
            version_store,
            pretty_print,
        }
    }

    /// Returns `true` if a file with `version` must run on a store at `current`.
    pub fn needs_run(version: u32, current: u32) -> bool {
        version > current
    }

    /// Processes `files` and reports one outcome per file, in version order.
    ///
    /// # Errors
    /// Only a failure to read the current schema version escapes; every
    /// per-file failure is reported in its [MigrationOutcome].
    pub fn run(&self, files: Vec<MigrationFile>) -> StickyResult<Vec<MigrationOutcome>> {
        let mut current = self.version_store.get()?;
        let mut outcomes = Vec::with_capacity(files.len());

        for file in files.into_iter().sorted_by_key(|file| file.version) {
            let status = if !MigrationManager::needs_run(file.version, current) {
                log::debug!(
                    "Skipping migration {}, schema is already at version {}",
                    file,
                    current
                );
                MigrationStatus::Skipped
            } else {
                match self.migrate_file(&file) {
                    Ok(status) => {
                        current = file.version;
                        status
                    }
                    Err(err) => {
                        log::error!("Migration {} abandoned: {}", file, err);
                        MigrationStatus::Failed(err)
                    }
                }
            };

            outcomes.push(MigrationOutcome {
                version: file.version,
                status,
            });
        }

        Ok(outcomes)
    }

    fn migrate_file(&self, file: &MigrationFile) -> StickyResult<MigrationStatus> {
        log::info!("----Begin update to version {}----", file.version);

        let body = file.load()?;
        let tasks = parse_tasks(&body)?;
        log::debug!("Parsed {} tasks from migration {}", tasks.len(), file);

        let plan = MigrationExecutor::new(self.store.clone()).execute(&tasks)?;
        if plan.skipped_tasks > 0 {
            log::warn!(
                "{} malformed tasks skipped in migration {}",
                plan.skipped_tasks,
                file
            );
        }

        let status = self.persist(&plan)?;
        self.version_store.set(file.version)?;

        log::info!("----Finished update to version {}----", file.version);
        Ok(status)
    }

    /// Commits a plan: every staged collection is encoded before anything is
    /// written, then each entity is replaced atomically, then renames run in
    /// task order.
    fn persist(&self, plan: &MigrationPlan) -> StickyResult<MigrationStatus> {
        let encoded = plan
            .staged
            .iter()
            .map(|(entity, records)| {
                encode_collection(records, self.pretty_print).map(|bytes| (entity, bytes))
            })
            .collect::<StickyResult<Vec<_>>>()?;

        for (index, (entity, bytes)) in encoded.iter().enumerate() {
            if let Err(err) = self.store.write(entity, bytes) {
                if index > 0 {
                    log::error!(
                        "Write of {} failed after {} entities were already written",
                        entity,
                        index
                    );
                }
                return Err(err);
            }
            log::debug!(
                "Wrote {} records of {}",
                plan.staged.get(entity).map_or(0, Vec::len),
                entity
            );
        }

        for rename in &plan.renames {
            self.store.rename(&rename.from, &rename.to)?;
            log::debug!("Renamed entity {} to {}", rename.from, rename.to);
        }

        Ok(MigrationStatus::Applied {
            entities_written: encoded.len(),
            entities_renamed: plan.renames.len(),
        })
    }
}
