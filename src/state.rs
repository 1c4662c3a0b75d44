//! # Summary
//!
//! This module defines the local replica of the key-value store, and the
//! only path by which decided operations mutate it.
//!
//! Reads take a shared lock and may run alongside each other. Writes take
//! the exclusive lock, and only ever arrive through `apply`, after a round
//! has been decided or a Learn has been received.

use hashbrown::HashMap as Map;
use parking_lot::RwLock;

use crate::operation::Operation;

/// Thread-safe in-memory key-value map.
#[derive(Debug, Default)]
pub struct Store(RwLock<Map<String, String>>);

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.0.read().get(key).cloned()
    }

    /// Applies a decided operation. Idempotent: a duplicated Learn leaves
    /// the map exactly as a single delivery would, and deleting an absent
    /// key does nothing.
    pub fn apply(&self, operation: &Operation) {
        match operation {
        | Operation::Put { key, value } => self.put(key, value),
        | Operation::Delete { key } => self.delete(key),
        }
    }

    fn put(&self, key: &str, value: &str) {
        self.0.write().insert(key.to_string(), value.to_string());
    }

    fn delete(&self, key: &str) {
        self.0.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Copies the current contents, for comparing replicas.
    pub fn snapshot(&self) -> Map<String, String> {
        self.0.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let store = Store::new();
        assert_eq!(store.get("a"), None);
        store.apply(&Operation::put("a", "1").unwrap());
        assert_eq!(store.get("a"), Some("1".to_string()));
        store.apply(&Operation::put("a", "2").unwrap());
        assert_eq!(store.get("a"), Some("2".to_string()));
    }

    #[test]
    fn put_is_idempotent() {
        let once = Store::new();
        let twice = Store::new();
        let put = Operation::put("a", "1").unwrap();
        once.apply(&put);
        twice.apply(&put);
        twice.apply(&put);
        assert_eq!(once.snapshot(), twice.snapshot());
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn delete_absent_key_is_noop() {
        let store = Store::new();
        store.apply(&Operation::put("b", "1").unwrap());
        let before = store.snapshot();
        store.apply(&Operation::delete("a").unwrap());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn last_applied_wins() {
        let (first, second) = (Store::new(), Store::new());
        let a = Operation::put("k", "a").unwrap();
        let b = Operation::put("k", "b").unwrap();
        first.apply(&a);
        first.apply(&b);
        second.apply(&b);
        second.apply(&a);
        assert_eq!(first.get("k"), Some("b".to_string()));
        assert_eq!(second.get("k"), Some("a".to_string()));
    }

    #[test]
    fn delete_removes_key() {
        let store = Store::new();
        store.apply(&Operation::put("a", "1").unwrap());
        store.apply(&Operation::delete("a").unwrap());
        store.apply(&Operation::delete("a").unwrap());
        assert_eq!(store.get("a"), None);
        assert!(store.is_empty());
    }
}
