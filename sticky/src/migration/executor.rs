use super::action::{ActionKind, MigrationTask};
use super::resolver::{apply, remove_keys, rename_key, set_key};
use crate::common::{EntityCollection, JsonObject, JsonValue};
use crate::errors::{ErrorKind, StickyError, StickyResult};
use crate::store::{EntityStore, EntityStoreProvider};
use indexmap::IndexMap;

/// Entity collections already rewritten while processing one migration file.
///
/// Later tasks against the same entity read from here instead of storage,
/// so several tasks in one file compose. Entities keep the order in which
/// they were first touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingStore {
    collections: IndexMap<String, EntityCollection>,
}

impl StagingStore {
    pub fn new() -> Self {
        StagingStore::default()
    }

    pub fn get(&self, entity: &str) -> Option<&EntityCollection> {
        self.collections.get(entity)
    }

    pub fn get_mut(&mut self, entity: &str) -> Option<&mut EntityCollection> {
        self.collections.get_mut(entity)
    }

    pub fn insert(&mut self, entity: String, collection: EntityCollection) {
        self.collections.insert(entity, collection);
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.collections.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityCollection)> {
        self.collections.iter()
    }
}

/// A storage level rename scheduled by a `renameEntity` task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRename {
    pub from: String,
    pub to: String,
}

/// Everything a migration file wants persisted, computed entirely in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPlan {
    /// Full new contents of every rewritten entity.
    pub staged: StagingStore,
    /// Entity renames, in task order.
    pub renames: Vec<EntityRename>,
    /// Tasks skipped because their payload had the wrong shape.
    pub skipped_tasks: usize,
}

impl MigrationPlan {
    /// Returns `true` if `entity` is renamed away by this plan.
    pub fn is_renamed_away(&self, entity: &str) -> bool {
        self.renames.iter().any(|rename| rename.from == entity)
    }

    /// Returns `true` if `entity` is the destination of a rename in this plan.
    pub fn is_rename_target(&self, entity: &str) -> bool {
        self.renames.iter().any(|rename| rename.to == entity)
    }
}

/// An edit applied to every record of one entity.
enum RecordCommand {
    RemoveKeys {
        path: Vec<String>,
        names: Vec<String>,
    },
    SetKey {
        path: Vec<String>,
        key: String,
        value: JsonValue,
    },
    RenameKey {
        path: Vec<String>,
        from: String,
        to: String,
    },
}

impl RecordCommand {
    /// Builds the edit for a record level task.
    ///
    /// # Errors
    /// [ErrorKind::MalformedTask] if the payload has the wrong shape.
    fn from_task(task: &MigrationTask) -> StickyResult<RecordCommand> {
        let node = &task.node;
        match task.action {
            ActionKind::RemoveProperty => {
                let names = node.value.as_string_list().ok_or_else(|| {
                    malformed(task, "expected an array of property names")
                })?;
                Ok(RecordCommand::RemoveKeys {
                    path: node.path_with_key(),
                    names,
                })
            }
            ActionKind::AddProperty => Ok(RecordCommand::SetKey {
                path: node.path.clone(),
                key: node.key.clone(),
                value: node.value.clone(),
            }),
            ActionKind::RenameProperty => {
                let to = node
                    .value
                    .as_str()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| malformed(task, "expected the new property name"))?;
                Ok(RecordCommand::RenameKey {
                    path: node.path.clone(),
                    from: node.key.clone(),
                    to: to.to_string(),
                })
            }
            ActionKind::RenameEntity => Err(StickyError::new(
                "renameEntity does not edit records",
                ErrorKind::InternalError,
            )),
        }
    }

    fn apply_all(&self, records: EntityCollection) -> EntityCollection {
        match self {
            RecordCommand::RemoveKeys { path, names } => {
                each_record(records, path, remove_keys(names.clone()))
            }
            RecordCommand::SetKey { path, key, value } => {
                each_record(records, path, set_key(key.clone(), value.clone()))
            }
            RecordCommand::RenameKey { path, from, to } => {
                each_record(records, path, rename_key(from.clone(), to.clone()))
            }
        }
    }
}

fn each_record<F>(records: EntityCollection, path: &[String], op: F) -> EntityCollection
where
    F: Fn(JsonObject) -> JsonObject,
{
    records
        .into_iter()
        .map(|record| apply(record, path, &op))
        .collect()
}

fn malformed(task: &MigrationTask, expected: &str) -> StickyError {
    StickyError::new(
        &format!(
            "Malformed {} task for {}: {}, found {}",
            task.action,
            task.entity,
            expected,
            task.node.value.type_name()
        ),
        ErrorKind::MalformedTask,
    )
}

/// Applies the tasks of one migration file to in-memory entity collections.
///
/// Nothing is written to storage here. The returned [MigrationPlan] holds
/// the new collections and the scheduled renames; persisting it is up to the
/// caller.
pub struct MigrationExecutor {
    store: EntityStore,
}

impl MigrationExecutor {
    pub fn new(store: EntityStore) -> Self {
        MigrationExecutor { store }
    }

    /// Runs `tasks` in order and returns what must be persisted.
    ///
    /// A task with a malformed payload is logged and skipped. Any other
    /// failure abandons the whole file and discards everything staged so far.
    ///
    /// # Errors
    /// - [ErrorKind::MissingEntityData] if a task's entity has no staged or
    ///   stored data, or was renamed away earlier in the same file
    /// - [ErrorKind::MalformedFile] if stored entity data cannot be decoded
    /// - [ErrorKind::IOFailure] if storage cannot be read or a rename target
    ///   is already taken
    pub fn execute(&self, tasks: &[MigrationTask]) -> StickyResult<MigrationPlan> {
        let mut plan = MigrationPlan::default();
        for task in tasks {
            log::debug!("Executing {}", task);
            if task.action == ActionKind::RenameEntity {
                self.schedule_rename(task, &mut plan)?;
            } else {
                self.edit_records(task, &mut plan)?;
            }
        }
        Ok(plan)
    }

    fn edit_records(&self, task: &MigrationTask, plan: &mut MigrationPlan) -> StickyResult<()> {
        let command = match RecordCommand::from_task(task) {
            Ok(command) => command,
            Err(err) if !err.kind().is_file_fatal() => {
                self.require_entity(&task.entity, plan)?;
                log::warn!("{}, task skipped", err);
                plan.skipped_tasks += 1;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if plan.is_renamed_away(&task.entity) {
            log::error!("Entity {} was renamed earlier in this migration", task.entity);
            return Err(missing_entity(&task.entity));
        }

        log::info!("{}", describe(task));
        if let Some(records) = plan.staged.get_mut(&task.entity) {
            let current = std::mem::take(records);
            *records = command.apply_all(current);
            return Ok(());
        }

        let records = self.load_entity(&task.entity)?;
        plan.staged.insert(task.entity.clone(), command.apply_all(records));
        Ok(())
    }

    fn schedule_rename(&self, task: &MigrationTask, plan: &mut MigrationPlan) -> StickyResult<()> {
        let to = match task.node.value.as_str().filter(|name| !name.is_empty()) {
            Some(to) => to.to_string(),
            None => {
                self.require_entity(&task.entity, plan)?;
                log::warn!(
                    "{}, task skipped",
                    malformed(task, "expected the new entity name")
                );
                plan.skipped_tasks += 1;
                return Ok(());
            }
        };

        self.require_entity(&task.entity, plan)?;
        if to == task.entity {
            log::debug!("Entity {} renamed to itself, nothing to do", to);
            return Ok(());
        }

        if plan.staged.contains(&to) || plan.is_rename_target(&to) || self.store.exists(&to) {
            log::error!("Cannot rename {} to {}, target already exists", task.entity, to);
            return Err(StickyError::new(
                &format!("Cannot rename entity {} to {}, target already exists", task.entity, to),
                ErrorKind::IOFailure,
            ));
        }

        log::info!("{}", describe(task));
        plan.renames.push(EntityRename {
            from: task.entity.clone(),
            to,
        });
        Ok(())
    }

    fn require_entity(&self, entity: &str, plan: &MigrationPlan) -> StickyResult<()> {
        if plan.is_renamed_away(entity) {
            log::error!("Entity {} was renamed earlier in this migration", entity);
            return Err(missing_entity(entity));
        }
        if plan.staged.contains(entity) || self.store.exists(entity) {
            return Ok(());
        }
        log::error!("No data to migrate for entity {}", entity);
        Err(missing_entity(entity))
    }

    fn load_entity(&self, entity: &str) -> StickyResult<EntityCollection> {
        match self.store.read_collection(entity)? {
            Some(records) => Ok(records),
            None => {
                log::error!("No data to migrate for entity {}", entity);
                Err(missing_entity(entity))
            }
        }
    }
}

fn missing_entity(entity: &str) -> StickyError {
    StickyError::new(
        &format!("No entity data to migrate for {}", entity),
        ErrorKind::MissingEntityData,
    )
}

fn describe(task: &MigrationTask) -> String {
    let node = &task.node;
    let location = if node.path.is_empty() {
        String::new()
    } else {
        format!(" at {}", node.path.join("."))
    };
    match task.action {
        ActionKind::RenameEntity => format!("Renaming entity {} to {}", task.entity, node.value),
        ActionKind::RenameProperty => format!(
            "Renaming property {} to {} in {}{}",
            node.key, node.value, task.entity, location
        ),
        ActionKind::AddProperty => format!(
            "Adding property {} with default {} to {}{}",
            node.key, node.value, task.entity, location
        ),
        ActionKind::RemoveProperty => format!(
            "Removing properties {} from {} at {}",
            node.value,
            task.entity,
            node.path_with_key().join(".")
        ),
    }
}
