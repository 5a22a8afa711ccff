//! In-memory record set guarded by a reader/writer lock.
//!
//! Every read and write goes through [`Store`]; nothing else touches the map or
//! the dirty flag. Reads share the lock, writes take it exclusively, so a read
//! that starts after a `set` returns always observes that write.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Point-in-time copy of a dirty record set, taken for a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Records sorted by key so snapshots are stable across flushes
    pub records: BTreeMap<String, String>,
    /// Write generation the copy was taken at
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Records {
    map: HashMap<String, String>,
    dirty: bool,
    generation: u64,
}

/// Shared key-value store.
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<Records>,
}

impl Store {
    /// Create an empty, clean store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clean store from records loaded off disk.
    #[must_use]
    pub fn from_records(map: HashMap<String, String>) -> Self {
        Self {
            inner: RwLock::new(Records {
                map,
                dirty: false,
                generation: 0,
            }),
        }
    }

    /// Insert or overwrite `key` and mark the store dirty.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut records = self.inner.write();
        records.map.insert(key.into(), value.into());
        records.dirty = true;
        records.generation += 1;
    }

    /// Current value of `key`, or `None` if it was never set.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().map.get(key).cloned()
    }

    /// Number of distinct keys.
    pub fn count(&self) -> usize {
        self.inner.read().map.len()
    }

    /// Whether there are writes not yet covered by a durable snapshot.
    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    /// Copy the record set if it is dirty.
    ///
    /// The copy is taken under the shared lock, so writers are blocked only
    /// while the map is cloned, never during disk I/O.
    pub(crate) fn checkpoint(&self) -> Option<Checkpoint> {
        let records = self.inner.read();
        if !records.dirty {
            return None;
        }

        Some(Checkpoint {
            records: records
                .map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            generation: records.generation,
        })
    }

    /// Clear the dirty flag if nothing was written after `generation`.
    ///
    /// Returns `false` when a write raced the flush; the store then stays
    /// dirty and the next flush picks the write up.
    pub(crate) fn mark_clean(&self, generation: u64) -> bool {
        let mut records = self.inner.write();
        if records.generation != generation {
            return false;
        }
        records.dirty = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_get_missing_key() {
        let store = Store::new();
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.count(), 0);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_set_then_get() {
        let store = Store::new();
        store.set("a", "1");
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert!(store.is_dirty());

        store.set("a", "2");
        assert_eq!(store.get("a").as_deref(), Some("2"));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_empty_value_is_stored() {
        let store = Store::new();
        store.set("k", "");
        assert_eq!(store.get("k").as_deref(), Some(""));
    }

    #[test]
    fn test_loaded_store_is_clean() {
        let mut map = HashMap::new();
        map.insert("x".to_string(), "y".to_string());
        let store = Store::from_records(map);
        assert!(!store.is_dirty());
        assert!(store.checkpoint().is_none());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_checkpoint_and_mark_clean() {
        let store = Store::new();
        store.set("a", "1");
        store.set("b", "2");

        let checkpoint = store.checkpoint().unwrap();
        assert_eq!(checkpoint.records.len(), 2);
        assert_eq!(checkpoint.generation, 2);

        assert!(store.mark_clean(checkpoint.generation));
        assert!(!store.is_dirty());
        assert!(store.checkpoint().is_none());
    }

    #[test]
    fn test_write_during_flush_keeps_dirty() {
        let store = Store::new();
        store.set("a", "1");
        let checkpoint = store.checkpoint().unwrap();

        store.set("b", "2");

        assert!(!store.mark_clean(checkpoint.generation));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(Store::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        store.set(format!("t{t}-{i}"), format!("{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count(), 2000);
        assert_eq!(store.get("t7-249").as_deref(), Some("249"));
    }

    proptest! {
        #[test]
        fn prop_count_matches_distinct_keys(keys in prop::collection::vec("[a-z]{1,6}", 0..64)) {
            let store = Store::new();
            for key in &keys {
                store.set(key.as_str(), "v");
            }
            let distinct: HashSet<_> = keys.iter().collect();
            prop_assert_eq!(store.count(), distinct.len());
        }

        #[test]
        fn prop_get_returns_last_write(
            writes in prop::collection::vec(("[a-c]{1,2}", ".{0,8}"), 1..32),
            probe in "[a-c]{1,2}",
        ) {
            let store = Store::new();
            let mut expected = HashMap::new();
            for (key, value) in &writes {
                store.set(key.as_str(), value.as_str());
                expected.insert(key.clone(), value.clone());
            }
            prop_assert_eq!(store.get(&probe), expected.get(&probe).cloned());
        }
    }
}
