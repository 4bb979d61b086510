//! Append-only snapshot archive.

use crate::types::{Entry, Snapshot, SnapshotId, Timestamp};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Ordered collection of every snapshot ever created.
#[derive(Debug)]
pub struct SnapshotArchive {
    /// Snapshots in creation order.
    snapshots: Vec<Arc<Snapshot>>,

    /// Snapshot ID to position in `snapshots`.
    by_id: HashMap<SnapshotId, usize>,

    /// Next snapshot ID to assign.
    next_id: u64,
}

impl SnapshotArchive {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
            by_id: HashMap::new(),
            next_id: 1,
        }
    }

    /// Archive a snapshot of already-copied data and return it.
    pub fn push(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        tags: BTreeSet<String>,
        timestamp: Timestamp,
        data: HashMap<String, Entry>,
    ) -> Arc<Snapshot> {
        let id = SnapshotId(self.next_id);
        self.next_id += 1;

        let snapshot = Arc::new(Snapshot::new(id, name, timestamp, data, description, tags));
        self.by_id.insert(id, self.snapshots.len());
        self.snapshots.push(Arc::clone(&snapshot));

        snapshot
    }

    /// Get a snapshot by ID.
    pub fn get(&self, id: SnapshotId) -> Option<Arc<Snapshot>> {
        self.by_id
            .get(&id)
            .and_then(|&pos| self.snapshots.get(pos))
            .cloned()
    }

    /// All snapshots in creation order.
    pub fn all(&self) -> Vec<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    /// Snapshots carrying the given tag, in creation order.
    pub fn with_tag(&self, tag: &str) -> Vec<Arc<Snapshot>> {
        self.snapshots
            .iter()
            .filter(|s| s.tags.contains(tag))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Snapshot>> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for SnapshotArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, Entry> {
        pairs
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    Entry {
                        key: k.to_string(),
                        value: v.to_string(),
                        last_modified: Timestamp(0),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_ids_are_sequential_and_unique() {
        let mut archive = SnapshotArchive::new();
        let a = archive.push("a", None, BTreeSet::new(), Timestamp(1), data(&[]));
        let b = archive.push("b", None, BTreeSet::new(), Timestamp(2), data(&[]));

        assert_eq!(a.id, SnapshotId(1));
        assert_eq!(b.id, SnapshotId(2));
        let c = archive.push("c", None, BTreeSet::new(), Timestamp(3), data(&[]));
        assert_eq!(c.id, SnapshotId(3));
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn test_get_and_order() {
        let mut archive = SnapshotArchive::new();
        archive.push("first", None, BTreeSet::new(), Timestamp(1), data(&[("k", "1")]));
        let second = archive.push(
            "second",
            Some("desc".to_string()),
            BTreeSet::new(),
            Timestamp(2),
            data(&[("k", "2")]),
        );

        let fetched = archive.get(second.id).unwrap();
        assert_eq!(fetched.name, "second");
        assert_eq!(fetched.description.as_deref(), Some("desc"));
        assert_eq!(fetched.value("k"), Some("2"));

        let names: Vec<_> = archive.all().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(archive.get(SnapshotId(99)).is_none());
    }

    #[test]
    fn test_with_tag() {
        let mut archive = SnapshotArchive::new();
        let tags: BTreeSet<String> = ["release".to_string()].into_iter().collect();
        archive.push("tagged", None, tags, Timestamp(1), data(&[]));
        archive.push("plain", None, BTreeSet::new(), Timestamp(2), data(&[]));

        let found = archive.with_tag("release");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "tagged");
    }
}
