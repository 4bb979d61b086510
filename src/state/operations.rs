//! Replaying logged operations onto a state table.

use crate::error::{Result, StoreError};
use crate::snapshots::SnapshotArchive;
use crate::state::table::{copy_entries, StateTable};
use crate::types::{Operation, OperationKind};

/// Apply one logged operation to a state table.
///
/// `Snapshot` operations do not touch state. `Restore` operations replace
/// the table with a copy of the archived snapshot they reference.
pub fn apply_operation(
    state: &mut StateTable,
    operation: &Operation,
    archive: &SnapshotArchive,
) -> Result<()> {
    match operation.kind {
        OperationKind::Write => {
            let (key, value) = match (&operation.key, &operation.value) {
                (Some(k), Some(v)) => (k, v),
                _ => {
                    return Err(StoreError::InvalidInput(format!(
                        "write operation {:?} is missing its key or value",
                        operation.sequence
                    )))
                }
            };
            state.put(key, value, operation.timestamp);
        }

        OperationKind::Delete => {
            if let Some(key) = &operation.key {
                state.remove(key);
            }
        }

        OperationKind::Clear => state.clear(),

        OperationKind::Snapshot => {}

        OperationKind::Restore => {
            let id = operation.snapshot_id.ok_or_else(|| {
                StoreError::InvalidInput(format!(
                    "restore operation {:?} has no snapshot id",
                    operation.sequence
                ))
            })?;
            let snapshot = archive.get(id).ok_or(StoreError::SnapshotNotFound(id))?;
            state.replace(copy_entries(&snapshot.data)?);
        }
    }

    Ok(())
}

/// Rebuild state from scratch by applying every operation in order.
pub fn replay<'a>(
    operations: impl IntoIterator<Item = &'a Operation>,
    archive: &SnapshotArchive,
) -> Result<StateTable> {
    let mut state = StateTable::new();
    for operation in operations {
        apply_operation(&mut state, operation, archive)?;
    }
    Ok(state)
}
