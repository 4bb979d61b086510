//! The live key/value table.

use crate::error::Result;
use crate::types::{Entry, Timestamp};
use std::collections::HashMap;

/// Mapping from key to entry representing "now".
#[derive(Debug, Default)]
pub struct StateTable {
    entries: HashMap<String, Entry>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entry by key.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Insert or overwrite a key. Returns the previous entry, if any.
    pub fn put(&mut self, key: &str, value: &str, timestamp: Timestamp) -> Option<Entry> {
        self.entries.insert(
            key.to_string(),
            Entry {
                key: key.to_string(),
                value: value.to_string(),
                last_modified: timestamp,
            },
        )
    }

    /// Remove a key. Returns the removed entry, if it existed.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the whole table with already-copied data.
    pub fn replace(&mut self, data: HashMap<String, Entry>) {
        self.entries = data;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copies of all entries, sorted by key.
    pub fn entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Take the underlying mapping.
    pub fn into_map(self) -> HashMap<String, Entry> {
        self.entries
    }

    /// Borrow the underlying mapping.
    pub fn as_map(&self) -> &HashMap<String, Entry> {
        &self.entries
    }

    /// Independent copy of the whole table, for snapshotting.
    pub fn deep_copy(&self) -> Result<HashMap<String, Entry>> {
        copy_entries(&self.entries)
    }
}

/// Structurally clone a state mapping without sharing any allocation.
///
/// Every allocation goes through `try_reserve`, so exhaustion surfaces as
/// `StoreError::ResourceExhausted` before the caller has mutated anything.
pub fn copy_entries(source: &HashMap<String, Entry>) -> Result<HashMap<String, Entry>> {
    let mut copy = HashMap::new();
    copy.try_reserve(source.len())?;

    for (key, entry) in source {
        let copied = Entry {
            key: try_clone_str(&entry.key)?,
            value: try_clone_str(&entry.value)?,
            last_modified: entry.last_modified,
        };
        copy.insert(try_clone_str(key)?, copied);
    }

    Ok(copy)
}

fn try_clone_str(s: &str) -> Result<String> {
    let mut out = String::new();
    out.try_reserve_exact(s.len())?;
    out.push_str(s);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let mut table = StateTable::new();
        assert!(table.put("a", "1", Timestamp(1)).is_none());

        let prev = table.put("a", "2", Timestamp(2)).unwrap();
        assert_eq!(prev.value, "1");

        let entry = table.get("a").unwrap();
        assert_eq!(entry.value, "2");
        assert_eq!(entry.last_modified, Timestamp(2));

        assert!(table.remove("a").is_some());
        assert!(table.remove("a").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_keys_and_entries_sorted() {
        let mut table = StateTable::new();
        table.put("b", "2", Timestamp(1));
        table.put("c", "3", Timestamp(1));
        table.put("a", "1", Timestamp(1));

        assert_eq!(table.keys(), vec!["a", "b", "c"]);
        let values: Vec<_> = table.entries().into_iter().map(|e| e.value).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mut table = StateTable::new();
        table.put("a", "1", Timestamp(1));

        let copy = table.deep_copy().unwrap();
        table.put("a", "changed", Timestamp(2));
        table.put("b", "new", Timestamp(3));

        assert_eq!(copy.len(), 1);
        assert_eq!(copy["a"].value, "1");
        assert_eq!(copy["a"].last_modified, Timestamp(1));
    }

    #[test]
    fn test_replace() {
        let mut table = StateTable::new();
        table.put("old", "x", Timestamp(1));

        let mut other = StateTable::new();
        other.put("new", "y", Timestamp(2));

        table.replace(other.deep_copy().unwrap());
        assert!(table.get("old").is_none());
        assert_eq!(table.get("new").unwrap().value, "y");
    }
}
