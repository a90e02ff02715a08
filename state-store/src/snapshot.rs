//! Immutable published views of a [`StateStore`](crate::StateStore)

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// A consistent, immutable view of every entry at one published version
///
/// Cloning is cheap: entries are shared, never copied.
#[derive(Debug)]
pub struct Snapshot<K, V> {
    pub(crate) entries: Arc<HashMap<K, Arc<V>>>,
    pub(crate) version: u64,
}

impl<K, V> Clone for Snapshot<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            version: self.version,
        }
    }
}

impl<K: Eq + Hash, V> Snapshot<K, V> {
    pub(crate) fn empty() -> Self {
        Self {
            entries: Arc::new(HashMap::new()),
            version: 0,
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Publication counter; increases by one per publish
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<V>)> {
        self.entries.iter()
    }

    /// Entries matching `predicate`, cloned out of the snapshot
    pub fn filter<F>(&self, mut predicate: F) -> Vec<Arc<V>>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.entries
            .iter()
            .filter(|(k, v)| predicate(k, v))
            .map(|(_, v)| Arc::clone(v))
            .collect()
    }
}
