//! Core types for the store.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a snapshot. Never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position in the operation log.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }
}

/// Content hash of snapshot data (SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Hash the values of a state mapping.
    ///
    /// Keys are visited in sorted order and each field is length-prefixed.
    /// Timestamps are not part of the hash, so equal hashes mean the two
    /// mappings hold the same key/value pairs.
    pub fn of_entries(data: &HashMap<String, Entry>) -> Self {
        let sorted: BTreeMap<&str, &str> = data
            .iter()
            .map(|(k, e)| (k.as_str(), e.value.as_str()))
            .collect();

        let mut hasher = Sha256::new();
        for (key, value) in sorted {
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        Hash(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time. Clamps to zero if the system clock reads
    /// before the epoch.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A single key/value pair in the current state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub last_modified: Timestamp,
}

/// An immutable, named copy of the whole state at one instant.
///
/// Snapshots are handed out as `Arc<Snapshot>`. Nothing inside is
/// interior-mutable, so a shared snapshot can never change after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub name: String,
    pub timestamp: Timestamp,
    pub data: HashMap<String, Entry>,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    /// Hash of `data` taken at creation.
    pub digest: Hash,
}

impl Snapshot {
    /// Build a snapshot around data that has already been copied out of the
    /// live state.
    pub fn new(
        id: SnapshotId,
        name: impl Into<String>,
        timestamp: Timestamp,
        data: HashMap<String, Entry>,
        description: Option<String>,
        tags: BTreeSet<String>,
    ) -> Self {
        let digest = Hash::of_entries(&data);
        Self {
            id,
            name: name.into(),
            timestamp,
            data,
            description,
            tags,
            digest,
        }
    }

    /// Recompute the digest and compare it with the one taken at creation.
    pub fn verify(&self) -> bool {
        Hash::of_entries(&self.data) == self.digest
    }

    /// Number of entries captured.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value of a key as it was when the snapshot was taken.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|e| e.value.as_str())
    }
}

/// Kind of logged operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Write,
    Delete,
    Snapshot,
    Restore,
    Clear,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Write => "write",
            OperationKind::Delete => "delete",
            OperationKind::Snapshot => "snapshot",
            OperationKind::Restore => "restore",
            OperationKind::Clear => "clear",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable record in the operation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Position in the log (assigned by the log).
    pub sequence: Sequence,

    pub kind: OperationKind,

    pub timestamp: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<SnapshotId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Input for a new operation (before a sequence is assigned).
#[derive(Clone, Debug)]
pub struct OperationInput {
    pub kind: OperationKind,
    pub timestamp: Timestamp,
    pub key: Option<String>,
    pub value: Option<String>,
    pub snapshot_id: Option<SnapshotId>,
    pub description: Option<String>,
}

impl OperationInput {
    fn bare(kind: OperationKind, timestamp: Timestamp) -> Self {
        Self {
            kind,
            timestamp,
            key: None,
            value: None,
            snapshot_id: None,
            description: None,
        }
    }

    pub fn write(key: impl Into<String>, value: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
            ..Self::bare(OperationKind::Write, timestamp)
        }
    }

    pub fn delete(key: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::bare(OperationKind::Delete, timestamp)
        }
    }

    pub fn clear(timestamp: Timestamp) -> Self {
        Self::bare(OperationKind::Clear, timestamp)
    }

    pub fn snapshot(id: SnapshotId, description: Option<String>, timestamp: Timestamp) -> Self {
        Self {
            snapshot_id: Some(id),
            description,
            ..Self::bare(OperationKind::Snapshot, timestamp)
        }
    }

    pub fn restore(id: SnapshotId, timestamp: Timestamp) -> Self {
        Self {
            snapshot_id: Some(id),
            ..Self::bare(OperationKind::Restore, timestamp)
        }
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub entry_count: usize,
    pub snapshot_count: usize,
    pub operation_count: usize,
    pub operations_by_kind: BTreeMap<OperationKind, usize>,
}
