use crate::common::JsonValue;
use crate::errors::{ErrorKind, StickyError, StickyResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The structural edits a migration file can request.
///
/// The set is closed: an unrecognized action name in a migration file is
/// rejected with [ErrorKind::UnknownAction] and the file is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// `"renameEntity"`: renames an entity's storage file, records untouched
    RenameEntity,
    /// `"renameProperty"`: renames a key in every record
    RenameProperty,
    /// `"newProperty"`: adds a key with a default value to every record
    AddProperty,
    /// `"removeProperty"`: removes a list of keys from every record
    RemoveProperty,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::RenameEntity,
        ActionKind::RenameProperty,
        ActionKind::AddProperty,
        ActionKind::RemoveProperty,
    ];

    /// The name used for this action in migration files.
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::RenameEntity => "renameEntity",
            ActionKind::RenameProperty => "renameProperty",
            ActionKind::AddProperty => "newProperty",
            ActionKind::RemoveProperty => "removeProperty",
        }
    }
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ActionKind {
    type Err = StickyError;

    fn from_str(s: &str) -> StickyResult<Self> {
        ActionKind::ALL
            .iter()
            .find(|action| action.name() == s)
            .copied()
            .ok_or_else(|| {
                StickyError::new(
                    &format!("\"{}\" doesn't match any available actions", s),
                    ErrorKind::UnknownAction,
                )
            })
    }
}

/// A leaf of a flattened migration document.
///
/// `path` holds the object keys above the leaf (never `key` itself), `key`
/// is the leaf's own key and `value` its non-object payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PathNode {
    pub path: Vec<String>,
    pub key: String,
    pub value: JsonValue,
}

impl PathNode {
    pub fn new(path: Vec<String>, key: impl Into<String>, value: JsonValue) -> Self {
        PathNode {
            path,
            key: key.into(),
            value,
        }
    }

    /// The node's path followed by its own key.
    pub fn path_with_key(&self) -> Vec<String> {
        let mut full = self.path.clone();
        full.push(self.key.clone());
        full
    }
}

/// One unit of work applied to every record of a single entity.
///
/// The node's path no longer contains the action name or the entity name;
/// what remains is the location inside each record.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationTask {
    pub action: ActionKind,
    pub entity: String,
    pub node: PathNode,
}

impl Display for MigrationTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}", self.action, self.entity)?;
        if !self.node.path.is_empty() {
            write!(f, " at {}", self.node.path.join("."))?;
        }
        write!(f, " ({} -> {})", self.node.key, self.node.value)
    }
}
