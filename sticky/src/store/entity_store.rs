use crate::common::{EntityCollection, JsonValue};
use crate::errors::{ErrorKind, StickyError, StickyResult};
use std::ops::Deref;
use std::sync::Arc;

/// Low-level contract for persisting entity documents.
///
/// # Purpose
/// Stores one opaque byte document per entity name. The migration engine
/// reads and rewrites whole documents; it never asks for partial reads.
///
/// # Implementations
/// - `FileEntityStore`: files under a storage directory
/// - `InMemoryEntityStore`: a shared in-process map
///
/// # Thread Safety
/// Implementers must be `Send + Sync`. No locking is implied: callers keep
/// ordinary traffic away from the store while a migration runs.
pub trait EntityStoreProvider: Send + Sync {
    /// Reads the document stored for `entity`, or `None` if there is none.
    fn read(&self, entity: &str) -> StickyResult<Option<Vec<u8>>>;

    /// Replaces the document stored for `entity` with `bytes`.
    fn write(&self, entity: &str, bytes: &[u8]) -> StickyResult<()>;

    /// Moves the document of `old` to `new` without touching its contents.
    ///
    /// # Errors
    /// Fails with [ErrorKind::IOFailure] if `old` has no document or `new`
    /// already has one.
    fn rename(&self, old: &str, new: &str) -> StickyResult<()>;

    /// Returns `true` if a document is stored for `entity`.
    fn exists(&self, entity: &str) -> bool;

    /// Deletes the document of `entity`. Removing an absent entity is not an error.
    fn remove(&self, entity: &str) -> StickyResult<()>;

    /// Lists every stored entity name in ascending order.
    fn entity_names(&self) -> StickyResult<Vec<String>>;

    /// Deletes every stored entity document.
    fn clear(&self) -> StickyResult<()> {
        for name in self.entity_names()? {
            self.remove(&name)?;
        }
        Ok(())
    }
}

/// Shared handle to an [EntityStoreProvider].
///
/// Cloning is cheap and every clone talks to the same provider. Besides the
/// raw byte contract (reachable through `Deref`), it decodes and encodes
/// whole entity collections.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<dyn EntityStoreProvider>,
}

impl EntityStore {
    pub fn new<T: EntityStoreProvider + 'static>(inner: T) -> Self {
        EntityStore {
            inner: Arc::new(inner),
        }
    }

    /// Reads and decodes the collection of `entity`.
    ///
    /// Returns `Ok(None)` when nothing is stored for the entity.
    ///
    /// # Errors
    /// - [ErrorKind::MalformedFile] if the stored bytes are not a JSON array
    ///   of objects
    /// - any error raised by the provider's `read`
    pub fn read_collection(&self, entity: &str) -> StickyResult<Option<EntityCollection>> {
        match self.inner.read(entity)? {
            Some(bytes) => decode_collection(entity, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Encodes `collection` and stores it as the new document of `entity`.
    pub fn write_collection(
        &self,
        entity: &str,
        collection: &EntityCollection,
        pretty: bool,
    ) -> StickyResult<()> {
        let bytes = encode_collection(collection, pretty)?;
        self.inner.write(entity, &bytes)
    }
}

impl Deref for EntityStore {
    type Target = Arc<dyn EntityStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Decodes an entity document into its records.
pub fn decode_collection(entity: &str, bytes: &[u8]) -> StickyResult<EntityCollection> {
    let value = JsonValue::from_slice(bytes).map_err(|e| {
        log::error!("Stored data for entity {} is not valid JSON: {}", entity, e);
        StickyError::new_with_cause(
            &format!("Stored data for entity {} is not valid JSON", entity),
            ErrorKind::MalformedFile,
            e,
        )
    })?;

    let records = value.into_array().ok_or_else(|| {
        StickyError::new(
            &format!("Stored data for entity {} is not a JSON array", entity),
            ErrorKind::MalformedFile,
        )
    })?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let type_name = record.type_name();
            record.into_object().ok_or_else(|| {
                StickyError::new(
                    &format!(
                        "Record {} of entity {} is a {}, expected an object",
                        index, entity, type_name
                    ),
                    ErrorKind::MalformedFile,
                )
            })
        })
        .collect()
}

/// Encodes records as an entity document.
pub fn encode_collection(collection: &EntityCollection, pretty: bool) -> StickyResult<Vec<u8>> {
    let result = if pretty {
        serde_json::to_vec_pretty(collection)
    } else {
        serde_json::to_vec(collection)
    };
    result.map_err(|e| {
        StickyError::new(
            &format!("Failed to encode entity collection: {}", e),
            ErrorKind::EncodingError,
        )
    })
}
