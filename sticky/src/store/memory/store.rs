use crate::common::{atomic, Atomic, LockedAccess};
use crate::errors::{ErrorKind, StickyError, StickyResult};
use crate::store::{validate_entity_name, EntityStore, EntityStoreProvider};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory implementation of an entity store.
///
/// # Purpose
/// Keeps every entity document in a shared map. It is used to run the
/// migration engine in isolation from the filesystem and by embedders that
/// persist documents somewhere else.
///
/// # Characteristics
/// - Cheap to clone, all clones share the same documents
/// - Counts reads and writes so tests can assert that nothing was touched
/// - Writes for selected entities can be made to fail
///
/// # Usage
/// ```text
/// let memory = InMemoryEntityStore::new();
/// memory.fail_writes_for("College");
/// let store = EntityStore::new(memory.clone());
/// assert!(store.write("College", b"[]").is_err());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    inner: Arc<InMemoryEntityStoreInner>,
}

impl InMemoryEntityStore {
    pub fn new() -> InMemoryEntityStore {
        InMemoryEntityStore::default()
    }

    /// Seeds the store with documents, replacing any with the same name.
    pub fn with_entities<I, K, V>(entities: I) -> InMemoryEntityStore
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let store = InMemoryEntityStore::new();
        store.inner.data.write_with(|data| {
            for (name, bytes) in entities {
                data.insert(name.into(), bytes.into());
            }
        });
        store
    }

    /// Makes every later write to `entity` fail with [ErrorKind::IOFailure].
    pub fn fail_writes_for(&self, entity: &str) {
        self.inner
            .failing_writes
            .write_with(|failing| failing.insert(entity.to_string()));
    }

    /// Lets writes to `entity` succeed again.
    pub fn allow_writes_for(&self, entity: &str) {
        self.inner
            .failing_writes
            .write_with(|failing| failing.remove(entity));
    }

    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Wraps a clone of this store in an [EntityStore].
    pub fn as_entity_store(&self) -> EntityStore {
        EntityStore::new(self.clone())
    }
}

impl EntityStoreProvider for InMemoryEntityStore {
    fn read(&self, entity: &str) -> StickyResult<Option<Vec<u8>>> {
        validate_entity_name(entity)?;
        self.inner.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.inner.data.read_with(|data| data.get(entity).cloned()))
    }

    fn write(&self, entity: &str, bytes: &[u8]) -> StickyResult<()> {
        validate_entity_name(entity)?;
        if self.inner.failing_writes.read_with(|failing| failing.contains(entity)) {
            log::error!("Write to {} rejected by the in-memory store", entity);
            return Err(StickyError::new(
                &format!("Write to entity {} failed", entity),
                ErrorKind::IOFailure,
            ));
        }

        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.inner
            .data
            .write_with(|data| data.insert(entity.to_string(), bytes.to_vec()));
        Ok(())
    }

    fn rename(&self, old: &str, new: &str) -> StickyResult<()> {
        validate_entity_name(old)?;
        validate_entity_name(new)?;

        self.inner.data.write_with(|data| {
            if data.contains_key(new) {
                return Err(StickyError::new(
                    &format!("Cannot rename entity {} to {}, target already exists", old, new),
                    ErrorKind::IOFailure,
                ));
            }
            match data.remove(old) {
                Some(bytes) => {
                    data.insert(new.to_string(), bytes);
                    Ok(())
                }
                None => Err(StickyError::new(
                    &format!("No data to rename for entity {}", old),
                    ErrorKind::IOFailure,
                )),
            }
        })
    }

    fn exists(&self, entity: &str) -> bool {
        self.inner.data.read_with(|data| data.contains_key(entity))
    }

    fn remove(&self, entity: &str) -> StickyResult<()> {
        self.inner.data.write_with(|data| data.remove(entity));
        Ok(())
    }

    fn entity_names(&self) -> StickyResult<Vec<String>> {
        let mut names = self
            .inner
            .data
            .read_with(|data| data.keys().cloned().collect::<Vec<_>>());
        names.sort();
        Ok(names)
    }
}

struct InMemoryEntityStoreInner {
    data: Atomic<HashMap<String, Vec<u8>>>,
    failing_writes: Atomic<HashSet<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl Default for InMemoryEntityStoreInner {
    fn default() -> Self {
        InMemoryEntityStoreInner {
            data: atomic(HashMap::new()),
            failing_writes: atomic(HashSet::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }
}
