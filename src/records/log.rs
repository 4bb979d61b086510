//! Append-only operation log.

use crate::records::index::OperationIndex;
use crate::types::{Operation, OperationInput, OperationKind, Sequence, SnapshotId};
use std::collections::BTreeMap;

/// Append-only, sequence-numbered history of everything done to the store.
#[derive(Debug, Default)]
pub struct OperationLog {
    /// Operations, oldest first. `operations[i].sequence == Sequence(i + 1)`.
    operations: Vec<Operation>,

    /// Sequence of the last appended operation.
    head: Sequence,

    index: OperationIndex,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation and return the stored record.
    pub fn append(&mut self, input: OperationInput) -> Operation {
        let sequence = self.head.next();

        let operation = Operation {
            sequence,
            kind: input.kind,
            timestamp: input.timestamp,
            key: input.key,
            value: input.value,
            snapshot_id: input.snapshot_id,
            description: input.description,
        };

        self.index.add(&operation);
        self.operations.push(operation.clone());
        self.head = sequence;

        operation
    }

    /// Sequence of the most recent operation (0 when empty).
    pub fn head(&self) -> Sequence {
        self.head
    }

    /// Get an operation by sequence.
    pub fn get(&self, sequence: Sequence) -> Option<&Operation> {
        let pos = sequence.0.checked_sub(1)?;
        self.operations.get(pos as usize)
    }

    /// Copy of the full history, oldest first.
    pub fn to_vec(&self) -> Vec<Operation> {
        self.operations.clone()
    }

    /// Copy of everything after `sequence`, oldest first.
    pub fn since(&self, sequence: Sequence) -> Vec<Operation> {
        let start = (sequence.0 as usize).min(self.operations.len());
        self.operations[start..].to_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Operations that named a key, oldest first.
    pub fn for_key(&self, key: &str) -> Vec<Operation> {
        self.index
            .sequences_for_key(key)
            .iter()
            .filter_map(|&seq| self.get(seq).cloned())
            .collect()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.index.count(kind)
    }

    pub fn counts_by_kind(&self) -> BTreeMap<OperationKind, usize> {
        self.index.counts()
    }

    /// The operation that logged a snapshot's creation.
    pub fn snapshot_operation(&self, id: SnapshotId) -> Option<&Operation> {
        self.index.snapshot_sequence(id).and_then(|seq| self.get(seq))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn test_append_assigns_sequences() {
        let mut log = OperationLog::new();
        assert_eq!(log.head(), Sequence(0));

        let first = log.append(OperationInput::write("a", "1", Timestamp(10)));
        let second = log.append(OperationInput::clear(Timestamp(11)));

        assert_eq!(first.sequence, Sequence(1));
        assert_eq!(second.sequence, Sequence(2));
        assert_eq!(log.head(), Sequence(2));
        assert_eq!(log.get(Sequence(1)).unwrap().key.as_deref(), Some("a"));
        assert!(log.get(Sequence(0)).is_none());
        assert!(log.get(Sequence(3)).is_none());
    }

    #[test]
    fn test_since_and_for_key() {
        let mut log = OperationLog::new();
        log.append(OperationInput::write("a", "1", Timestamp(1)));
        log.append(OperationInput::write("b", "2", Timestamp(2)));
        log.append(OperationInput::delete("a", Timestamp(3)));

        let tail = log.since(Sequence(1));
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, Sequence(2));
        assert!(log.since(Sequence(10)).is_empty());

        let history = log.for_key("a");
        let kinds: Vec<_> = history.iter().map(|op| op.kind).collect();
        assert_eq!(kinds, vec![OperationKind::Write, OperationKind::Delete]);
    }

    #[test]
    fn test_snapshot_lookup_and_counts() {
        let mut log = OperationLog::new();
        log.append(OperationInput::write("a", "1", Timestamp(1)));
        log.append(OperationInput::snapshot(
            SnapshotId(3),
            Some("desc".to_string()),
            Timestamp(2),
        ));

        let op = log.snapshot_operation(SnapshotId(3)).unwrap();
        assert_eq!(op.sequence, Sequence(2));
        assert_eq!(op.description.as_deref(), Some("desc"));
        assert_eq!(log.count(OperationKind::Snapshot), 1);
        assert_eq!(log.counts_by_kind()[&OperationKind::Write], 1);
    }
}
