//! Turns the JSON body of a migration file into typed [MigrationTask]s.
//!
//! A body is keyed by action name and nests entity and property names below
//! it. Parsing happens in two steps: the body is flattened into leaf
//! [PathNode]s, then each leaf is classified into a task. Any leaf that
//! cannot be classified fails the whole file before a task runs.

use super::action::{ActionKind, MigrationTask, PathNode};
use crate::common::{JsonObject, JsonValue};
use crate::errors::{ErrorKind, StickyError, StickyResult};

/// Parses a migration body into the tasks it describes, in document order.
///
/// # Errors
/// - [ErrorKind::MalformedFile] if the body is not an object or a leaf sits
///   directly at the top level
/// - [ErrorKind::UnknownAction] if a top level key is not an action name
pub fn parse_tasks(body: &JsonValue) -> StickyResult<Vec<MigrationTask>> {
    let root = body.as_object().ok_or_else(|| {
        log::error!("Migration body is a {}, expected an object", body.type_name());
        StickyError::new(
            &format!("Migration body must be an object, found {}", body.type_name()),
            ErrorKind::MalformedFile,
        )
    })?;

    if root.is_empty() {
        log::warn!("Migration body is empty, no tasks to run");
    }

    // Every top level key must name an action, including keys with no leaves
    for action_name in root.keys() {
        action_name.parse::<ActionKind>().inspect_err(|_| {
            log::error!("Invalid action \"{}\"", action_name);
        })?;
    }

    flatten(root, &[]).into_iter().map(classify).collect()
}

/// Flattens `object` depth-first into one [PathNode] per non-object leaf.
///
/// Each node carries the chain of object keys leading to it, starting with
/// `path`. The path is only ever extended when descending, so sibling
/// branches that reuse a key name cannot leak into each other.
pub fn flatten(object: &JsonObject, path: &[String]) -> Vec<PathNode> {
    let mut nodes = Vec::new();
    flatten_into(object, path, &mut nodes);
    nodes
}

fn flatten_into(object: &JsonObject, path: &[String], nodes: &mut Vec<PathNode>) {
    for (key, value) in object {
        match value {
            JsonValue::Object(child) => {
                let mut child_path = path.to_vec();
                child_path.push(key.clone());
                flatten_into(child, &child_path, nodes);
            }
            _ => nodes.push(PathNode::new(path.to_vec(), key.clone(), value.clone())),
        }
    }
}

/// Classifies a flattened node into a [MigrationTask].
///
/// The first path element names the action. If nothing else is left on the
/// path the node's key is the entity (`{action: {entity: value}}`),
/// otherwise the next path element is the entity and is consumed
/// (`{action: {entity: {property: value}}}`).
pub fn classify(node: PathNode) -> StickyResult<MigrationTask> {
    let PathNode { path, key, value } = node;
    let mut remaining = path.into_iter();

    let action_name = remaining.next().ok_or_else(|| {
        log::error!("Malformed or empty schema file near key \"{}\"", key);
        StickyError::new(
            &format!("Key \"{}\" is not nested under an action", key),
            ErrorKind::MalformedFile,
        )
    })?;

    let action = action_name.parse::<ActionKind>().inspect_err(|_| {
        log::error!("Invalid action \"{}\"", action_name);
    })?;

    let entity = match remaining.next() {
        Some(entity) => entity,
        None => key.clone(),
    };

    if entity.is_empty() {
        log::error!("Unable to parse entity name for action \"{}\"", action);
        return Err(StickyError::new(
            &format!("Empty entity name for action \"{}\"", action),
            ErrorKind::MalformedFile,
        ));
    }

    Ok(MigrationTask {
        action,
        entity,
        node: PathNode::new(remaining.collect(), key, value),
    })
}
