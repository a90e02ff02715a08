//! Single-writer keyed storage with atomic publication
//!
//! The writer owns a private working copy. Mutations touch only that copy
//! until [`StateStore::publish`] swaps a new [`Snapshot`] in for readers,
//! so a reader never observes an entry halfway through an update.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use crate::snapshot::Snapshot;

type Shared<K, V> = Arc<RwLock<Snapshot<K, V>>>;

/// Writer half. There is exactly one per store; it is not `Clone`.
///
/// # Example
///
/// ```rust
/// use state_store::StateStore;
///
/// let mut store = StateStore::<String, u32>::new();
/// let reader = store.reader();
///
/// store.insert("a".to_string(), 1);
/// assert!(reader.get(&"a".to_string()).is_none());
///
/// store.publish();
/// assert_eq!(reader.get(&"a".to_string()).as_deref(), Some(&1));
/// ```
pub struct StateStore<K, V> {
    working: HashMap<K, Arc<V>>,
    shared: Shared<K, V>,
    version: u64,
    dirty: bool,
}

impl<K, V> StateStore<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            working: HashMap::new(),
            shared: Arc::new(RwLock::new(Snapshot::empty())),
            version: 0,
            dirty: false,
        }
    }

    /// A read handle onto published snapshots
    pub fn reader(&self) -> StoreReader<K, V> {
        StoreReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Unpublished view: what the next publish will expose
    pub fn get(&self, key: &K) -> Option<&V> {
        self.working.get(key).map(Arc::as_ref)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.working.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<Arc<V>> {
        self.dirty = true;
        self.working.insert(key, Arc::new(value))
    }

    pub fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        let removed = self.working.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Mutate one entry in place. Entries still referenced by a published
    /// snapshot are copied first, so readers keep their version.
    pub fn modify<R>(&mut self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let entry = self.working.get_mut(key)?;
        self.dirty = true;
        Some(f(Arc::make_mut(entry)))
    }

    /// Drop every entry for which `keep` returns false; returns the removed keys
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> Vec<K> {
        let removed: Vec<K> = self
            .working
            .iter()
            .filter(|(k, v)| !keep(k, v))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &removed {
            self.working.remove(key);
        }
        if !removed.is_empty() {
            self.dirty = true;
        }
        removed
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.working.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.working.iter().map(|(k, v)| (k, v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.working.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working.is_empty()
    }

    /// Whether there are unpublished changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Expose the working copy to readers. A no-op when nothing changed.
    /// Returns the published version.
    pub fn publish(&mut self) -> u64 {
        if !self.dirty {
            return self.version;
        }
        self.version += 1;
        let snapshot = Snapshot {
            entries: Arc::new(self.working.clone()),
            version: self.version,
        };
        *self.shared.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        self.dirty = false;
        self.version
    }
}

impl<K, V> Default for StateStore<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for StateStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("entries", &self.working.len())
            .field("version", &self.version)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Read half. Cheap to clone and safe to share across threads.
///
/// Reads take a short read lock only to clone the current snapshot handle;
/// they never wait on the writer's work.
pub struct StoreReader<K, V> {
    shared: Shared<K, V>,
}

impl<K, V> Clone for StoreReader<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: Eq + Hash, V> StoreReader<K, V> {
    /// The latest published snapshot
    pub fn snapshot(&self) -> Snapshot<K, V> {
        self.shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.snapshot().get(key)
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
