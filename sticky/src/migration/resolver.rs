//! Generic navigation and rewriting of JSON objects along a key path.
//!
//! Records have no compile-time schema, so every edit made by a migration
//! is expressed as an object transform applied at the end of a path of
//! object keys. Paths only ever walk through objects; arrays and scalars
//! end the walk.

use crate::common::{JsonObject, JsonValue};

/// Resolves `path` inside `root` and returns the object found at its end.
///
/// Every segment must name a key whose value is itself an object. If any
/// segment is missing or resolves to a non-object, nothing is returned; a
/// partial match is never reported. An empty path resolves to `root`.
pub fn get<'a, S: AsRef<str>>(root: &'a JsonObject, path: &[S]) -> Option<&'a JsonObject> {
    path.iter().try_fold(root, |current, key| {
        current.get(key.as_ref()).and_then(JsonValue::as_object)
    })
}

/// Applies `op` to the object at the end of `path` and rebuilds every
/// ancestor around the transformed child.
///
/// Sibling keys and their order are preserved at every level. With an empty
/// path this is exactly `op(root)`. If the path does not resolve to an
/// object the root is returned unchanged; callers that need the destination
/// to exist must check with [get] first.
pub fn apply<S, F>(root: JsonObject, path: &[S], op: F) -> JsonObject
where
    S: AsRef<str>,
    F: FnOnce(JsonObject) -> JsonObject,
{
    if path.is_empty() {
        return op(root);
    }

    if get(&root, path).is_none() {
        log::trace!(
            "Path {:?} does not resolve to an object, leaving record unchanged",
            path.iter().map(|key| key.as_ref()).collect::<Vec<&str>>()
        );
        return root;
    }

    rebuild(root, path, op)
}

fn rebuild<S, F>(mut node: JsonObject, path: &[S], op: F) -> JsonObject
where
    S: AsRef<str>,
    F: FnOnce(JsonObject) -> JsonObject,
{
    match path.split_first() {
        None => op(node),
        Some((key, rest)) => {
            if let Some(JsonValue::Object(child)) = node.get_mut(key.as_ref()) {
                // replace in place so the key keeps its position
                let taken = std::mem::take(child);
                *child = rebuild(taken, rest, op);
            }
            node
        }
    }
}

/// Transform deleting every listed key that is present. Absent keys are ignored.
pub fn remove_keys(names: Vec<String>) -> impl Fn(JsonObject) -> JsonObject {
    move |mut obj| {
        for name in &names {
            obj.shift_remove(name.as_str());
        }
        obj
    }
}

/// Transform moving the value under `from` to `to`.
///
/// The renamed key takes the position of the old one. An existing `to` is
/// overwritten in place. If `from` is absent the object is returned unchanged.
pub fn rename_key(from: String, to: String) -> impl Fn(JsonObject) -> JsonObject {
    move |mut obj| {
        if from == to {
            return obj;
        }
        if let Some((index, _, value)) = obj.shift_remove_full(from.as_str()) {
            if obj.contains_key(to.as_str()) {
                obj.insert(to.clone(), value);
            } else {
                obj.shift_insert(index, to.clone(), value);
            }
        }
        obj
    }
}

/// Transform inserting `key` with `value`, overwriting any previous value.
pub fn set_key(key: String, value: JsonValue) -> impl Fn(JsonObject) -> JsonObject {
    move |mut obj| {
        obj.insert(key.clone(), value.clone());
        obj
    }
}
