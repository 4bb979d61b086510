//! Operation indices for efficient lookups.

use crate::types::{Operation, OperationKind, Sequence, SnapshotId};
use std::collections::{BTreeMap, HashMap};

/// Secondary indices over the operation log.
#[derive(Debug, Default)]
pub struct OperationIndex {
    /// Key to the sequences of operations that named it.
    by_key: HashMap<String, Vec<Sequence>>,

    /// Operation count per kind.
    kind_counts: BTreeMap<OperationKind, usize>,

    /// Snapshot ID to the sequence of the operation that created it.
    snapshot_created_at: HashMap<SnapshotId, Sequence>,
}

impl OperationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a freshly appended operation.
    pub fn add(&mut self, operation: &Operation) {
        *self.kind_counts.entry(operation.kind).or_insert(0) += 1;

        if let Some(key) = &operation.key {
            self.by_key
                .entry(key.clone())
                .or_default()
                .push(operation.sequence);
        }

        if operation.kind == OperationKind::Snapshot {
            if let Some(id) = operation.snapshot_id {
                self.snapshot_created_at.insert(id, operation.sequence);
            }
        }
    }

    /// Sequences of all operations that touched a key, oldest first.
    pub fn sequences_for_key(&self, key: &str) -> &[Sequence] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of operations of a kind.
    pub fn count(&self, kind: OperationKind) -> usize {
        self.kind_counts.get(&kind).copied().unwrap_or(0)
    }

    /// Counts for every kind seen so far.
    pub fn counts(&self) -> BTreeMap<OperationKind, usize> {
        self.kind_counts.clone()
    }

    /// Where a snapshot's creation was logged.
    pub fn snapshot_sequence(&self, id: SnapshotId) -> Option<Sequence> {
        self.snapshot_created_at.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn op(seq: u64, kind: OperationKind, key: Option<&str>, snap: Option<u64>) -> Operation {
        Operation {
            sequence: Sequence(seq),
            kind,
            timestamp: Timestamp(0),
            key: key.map(str::to_string),
            value: None,
            snapshot_id: snap.map(SnapshotId),
            description: None,
        }
    }

    #[test]
    fn test_indexes_keys_kinds_and_snapshots() {
        let mut index = OperationIndex::new();
        index.add(&op(1, OperationKind::Write, Some("a"), None));
        index.add(&op(2, OperationKind::Write, Some("b"), None));
        index.add(&op(3, OperationKind::Delete, Some("a"), None));
        index.add(&op(4, OperationKind::Snapshot, None, Some(7)));

        assert_eq!(index.sequences_for_key("a"), &[Sequence(1), Sequence(3)]);
        assert!(index.sequences_for_key("missing").is_empty());
        assert_eq!(index.count(OperationKind::Write), 2);
        assert_eq!(index.count(OperationKind::Clear), 0);
        assert_eq!(index.snapshot_sequence(SnapshotId(7)), Some(Sequence(4)));
        assert_eq!(index.counts().len(), 3);
    }
}
