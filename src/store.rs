//! Main Store struct tying all components together.

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::records::OperationLog;
use crate::seed::{
    COUNTER_KEY, DEMO_ENTRIES, INITIAL_SNAPSHOT_DESCRIPTION, INITIAL_SNAPSHOT_NAME,
};
use crate::snapshots::{diff, diff_archived, diff_entries, SnapshotArchive, SnapshotDiff};
use crate::state::{copy_entries, replay, StateTable};
use crate::subscriptions::{
    ListenerHandle, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
use crate::types::{
    Entry, Operation, OperationInput, OperationKind, Sequence, Snapshot, SnapshotId, StoreStats,
    Timestamp,
};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix of every value written by `simulate_corruption`.
pub const CORRUPTION_PREFIX: &str = "CORRUPTED_DATA_";

/// Name of the protective snapshot taken before simulated corruption.
pub const PRE_CORRUPTION_SNAPSHOT_NAME: &str = "Pre-corruption backup";

const PRE_CORRUPTION_SNAPSHOT_DESCRIPTION: &str = "Automatic backup before simulated corruption";

/// Characters used for corruption suffixes.
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix after `CORRUPTION_PREFIX`.
const CORRUPTION_SUFFIX_LEN: usize = 6;

/// What a new store starts with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SeedData {
    /// No keys.
    Empty,
    /// A handful of users, products and settings plus a `counter` key.
    #[default]
    Demo,
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Initial contents, written through the normal write path.
    pub seed: SeedData,

    /// Take an "Initial state" snapshot after seeding.
    pub initial_snapshot: bool,

    /// Fraction of keys drawn by `simulate_corruption`.
    pub corruption_ratio: f64,

    /// Seed for the corruption RNG (None = from entropy).
    pub rng_seed: Option<u64>,

    /// Buffer size for channel subscriptions.
    pub event_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seed: SeedData::Demo,
            initial_snapshot: true,
            corruption_ratio: 0.5,
            rng_seed: None,
            event_buffer_size: 1000,
        }
    }
}

impl StoreConfig {
    /// A store with no keys, no snapshots and an empty log.
    pub fn empty() -> Self {
        Self {
            seed: SeedData::Empty,
            initial_snapshot: false,
            ..Default::default()
        }
    }

    /// Reject settings the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.corruption_ratio) {
            return Err(StoreError::InvalidInput(format!(
                "corruption_ratio must be within 0.0..=1.0, got {}",
                self.corruption_ratio
            )));
        }
        if self.event_buffer_size == 0 {
            return Err(StoreError::InvalidInput(
                "event_buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a successful restore.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReceipt {
    /// Snapshot whose data is now the live state.
    pub restored_from: SnapshotId,
    /// Automatic snapshot of the state that was replaced.
    pub backup_id: SnapshotId,
    /// Log position of the restore operation.
    pub sequence: Sequence,
}

/// Outcome of `simulate_corruption`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionReport {
    /// Protective snapshot taken before any key was touched.
    pub backup_id: SnapshotId,
    /// Keys in draw order. Draws are with replacement, so a key can repeat.
    pub draws: Vec<String>,
}

impl CorruptionReport {
    /// Distinct keys that were overwritten, sorted.
    pub fn corrupted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .draws
            .iter()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        keys.sort();
        keys
    }
}

/// Number of corruption draws for a store holding `key_count` keys.
pub fn corruption_draws(key_count: usize, ratio: f64) -> usize {
    ((key_count as f64 * ratio).floor() as usize).max(1)
}

/// Whether a value was produced by `simulate_corruption`.
pub fn is_corrupted_value(value: &str) -> bool {
    value.starts_with(CORRUPTION_PREFIX)
}

/// Borrowed view of the whole store, for `Store::export_json`.
#[derive(Serialize)]
struct StoreView<'a> {
    entries: Vec<Entry>,
    snapshots: Vec<&'a Snapshot>,
    operations: Vec<&'a Operation>,
    current_snapshot: Option<SnapshotId>,
}

/// Everything guarded by the store lock.
struct Inner {
    state: StateTable,
    archive: SnapshotArchive,
    log: OperationLog,
    /// Snapshot most recently restored, if any.
    current_snapshot: Option<SnapshotId>,
    rng: StdRng,
}

impl Inner {
    fn write(&mut self, key: &str, value: &str, timestamp: Timestamp) -> StoreEvent {
        self.state.put(key, value, timestamp);
        let op = self.log.append(OperationInput::write(key, value, timestamp));
        StoreEvent::Written {
            key: key.to_string(),
            sequence: op.sequence,
        }
    }

    /// Copy current state into a new archived snapshot and log it.
    fn snapshot(
        &mut self,
        name: String,
        description: Option<String>,
        tags: BTreeSet<String>,
        timestamp: Timestamp,
    ) -> Result<(Arc<Snapshot>, StoreEvent)> {
        // Copy first: if this fails nothing has been touched.
        let data = self.state.deep_copy()?;
        let snapshot = self
            .archive
            .push(name, description.clone(), tags, timestamp, data);
        let op = self
            .log
            .append(OperationInput::snapshot(snapshot.id, description, timestamp));

        let event = StoreEvent::SnapshotCreated {
            id: snapshot.id,
            name: snapshot.name.clone(),
            sequence: op.sequence,
        };
        Ok((snapshot, event))
    }

    fn corruption_value(&mut self) -> String {
        let mut value = String::with_capacity(CORRUPTION_PREFIX.len() + CORRUPTION_SUFFIX_LEN);
        value.push_str(CORRUPTION_PREFIX);
        for _ in 0..CORRUPTION_SUFFIX_LEN {
            value.push(BASE36[self.rng.gen_range(0..BASE36.len())] as char);
        }
        value
    }
}

/// The time-travel key/value store.
///
/// Holds the live state, the snapshot archive and the operation log behind
/// a single lock, so every mutation (including the two steps of a restore)
/// is observed as one atomic unit. Listeners are notified after the lock is
/// released.
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    /// Time source for entries, snapshots and operations.
    clock: Arc<dyn Clock>,

    inner: RwLock<Inner>,

    subscriptions: Arc<SubscriptionManager>,
}

impl Store {
    /// Create a store using the system clock.
    pub fn new(config: StoreConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source.
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut inner = Inner {
            state: StateTable::new(),
            archive: SnapshotArchive::new(),
            log: OperationLog::new(),
            current_snapshot: None,
            rng,
        };

        // Nobody can be subscribed yet, so seeding events are discarded.
        if config.seed == SeedData::Demo {
            for (key, value) in DEMO_ENTRIES {
                inner.write(key, value, clock.now());
            }
        }

        if config.initial_snapshot {
            inner.snapshot(
                INITIAL_SNAPSHOT_NAME.to_string(),
                Some(INITIAL_SNAPSHOT_DESCRIPTION.to_string()),
                BTreeSet::new(),
                clock.now(),
            )?;
        }

        debug!(
            seed = ?config.seed,
            entries = inner.state.len(),
            snapshots = inner.archive.len(),
            "store created"
        );

        Ok(Self {
            config,
            clock,
            inner: RwLock::new(inner),
            subscriptions: Arc::new(SubscriptionManager::new()),
        })
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Key/Value Operations ---

    /// Insert or overwrite a key.
    pub fn write(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidInput("key must not be empty".to_string()));
        }

        let event = {
            let mut inner = self.inner.write();
            inner.write(key, value, self.clock.now())
        };

        debug!(key, "write");
        self.subscriptions.publish([event]);
        Ok(())
    }

    /// Current value of a key.
    pub fn read(&self, key: &str) -> Option<String> {
        self.inner.read().state.get(key).map(|e| e.value.clone())
    }

    /// Current entry of a key, with its modification time.
    pub fn entry(&self, key: &str) -> Option<Entry> {
        self.inner.read().state.get(key).cloned()
    }

    /// Remove a key. Returns whether it existed.
    ///
    /// Deleting an absent key is not logged and notifies nobody.
    pub fn delete(&self, key: &str) -> bool {
        let event = {
            let mut inner = self.inner.write();
            if inner.state.remove(key).is_none() {
                return false;
            }
            let op = inner.log.append(OperationInput::delete(key, self.clock.now()));
            StoreEvent::Deleted {
                key: key.to_string(),
                sequence: op.sequence,
            }
        };

        debug!(key, "delete");
        self.subscriptions.publish([event]);
        true
    }

    /// Remove every key as a single logged operation.
    pub fn clear_all(&self) {
        let (event, removed) = {
            let mut inner = self.inner.write();
            let removed = inner.state.len();
            inner.state.clear();
            let op = inner.log.append(OperationInput::clear(self.clock.now()));
            (StoreEvent::Cleared { sequence: op.sequence }, removed)
        };

        debug!(removed, "clear");
        self.subscriptions.publish([event]);
    }

    /// All keys, sorted.
    pub fn list_keys(&self) -> Vec<String> {
        self.inner.read().state.keys()
    }

    /// Copies of all entries, sorted by key.
    pub fn list_entries(&self) -> Vec<Entry> {
        self.inner.read().state.entries()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.inner.read().state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().state.is_empty()
    }

    /// Add one to the integer stored under `counter`.
    ///
    /// Returns the new value, or `None` if the key does not exist. The write
    /// goes through the normal write path.
    pub fn increment_counter(&self) -> Result<Option<i64>> {
        let (event, next) = {
            let mut inner = self.inner.write();
            let current = match inner.state.get(COUNTER_KEY) {
                Some(entry) => entry.value.trim().parse::<i64>().map_err(|_| {
                    StoreError::InvalidInput(format!(
                        "{} is not an integer: {:?}",
                        COUNTER_KEY, entry.value
                    ))
                })?,
                None => return Ok(None),
            };
            let next = current.checked_add(1).ok_or_else(|| {
                StoreError::InvalidInput(format!("{} would overflow", COUNTER_KEY))
            })?;
            let event = inner.write(COUNTER_KEY, &next.to_string(), self.clock.now());
            (event, next)
        };

        self.subscriptions.publish([event]);
        Ok(Some(next))
    }

    // --- Snapshot Operations ---

    /// Archive a copy of the current state.
    ///
    /// Empty names are accepted; callers enforce their own naming rules.
    pub fn create_snapshot(&self, name: &str, description: Option<&str>) -> Result<SnapshotId> {
        self.create_snapshot_with_tags(name, description, std::iter::empty::<String>())
    }

    /// Archive a copy of the current state with tags attached.
    pub fn create_snapshot_with_tags<I, T>(
        &self,
        name: &str,
        description: Option<&str>,
        tags: I,
    ) -> Result<SnapshotId>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();

        let (snapshot, event) = {
            let mut inner = self.inner.write();
            inner.snapshot(
                name.to_string(),
                description.map(str::to_string),
                tags,
                self.clock.now(),
            )?
        };

        info!(id = %snapshot.id, name, entries = snapshot.len(), "snapshot created");
        self.subscriptions.publish([event]);
        Ok(snapshot.id)
    }

    /// Every snapshot, in creation order.
    pub fn get_snapshots(&self) -> Vec<Arc<Snapshot>> {
        self.inner.read().archive.all()
    }

    /// Get a snapshot by ID.
    pub fn get_snapshot(&self, id: SnapshotId) -> Option<Arc<Snapshot>> {
        self.inner.read().archive.get(id)
    }

    /// Snapshots carrying a tag, in creation order.
    pub fn snapshots_with_tag(&self, tag: &str) -> Vec<Arc<Snapshot>> {
        self.inner.read().archive.with_tag(tag)
    }

    pub fn snapshot_count(&self) -> usize {
        self.inner.read().archive.len()
    }

    /// An owned copy of a snapshot's data, free to be modified.
    pub fn state_at_snapshot(&self, id: SnapshotId) -> Result<HashMap<String, Entry>> {
        let snapshot = self
            .get_snapshot(id)
            .ok_or(StoreError::SnapshotNotFound(id))?;
        copy_entries(&snapshot.data)
    }

    /// Snapshot most recently restored, if any.
    pub fn current_snapshot(&self) -> Option<SnapshotId> {
        self.inner.read().current_snapshot
    }

    /// Replace the live state with a snapshot's data.
    ///
    /// The current state is archived first as an automatic backup, so a
    /// restore can always be undone by restoring the backup. Both copies are
    /// made before anything is mutated: either the backup, the replacement
    /// and the restore log entry all happen, or none of them do. Listeners
    /// are notified once.
    pub fn restore_snapshot(&self, id: SnapshotId) -> Result<RestoreReceipt> {
        let receipt = {
            let mut guard = self.inner.write();
            let inner = &mut *guard;

            let target = inner
                .archive
                .get(id)
                .ok_or(StoreError::SnapshotNotFound(id))?;
            let backup_data = inner.state.deep_copy()?;
            let restored = copy_entries(&target.data)?;

            let backup_ts = self.clock.now();
            let backup = inner.archive.push(
                format!("Auto-backup before restoring to \"{}\"", target.name),
                Some(format!(
                    "System generated backup before restoring to snapshot {}",
                    id
                )),
                BTreeSet::new(),
                backup_ts,
                backup_data,
            );
            inner.log.append(OperationInput::snapshot(
                backup.id,
                backup.description.clone(),
                backup_ts,
            ));

            inner.state.replace(restored);
            inner.current_snapshot = Some(id);
            let op = inner
                .log
                .append(OperationInput::restore(id, self.clock.now()));

            RestoreReceipt {
                restored_from: id,
                backup_id: backup.id,
                sequence: op.sequence,
            }
        };

        info!(
            snapshot = %receipt.restored_from,
            backup = %receipt.backup_id,
            "restored snapshot"
        );
        self.subscriptions.publish([StoreEvent::Restored {
            snapshot_id: receipt.restored_from,
            backup_id: receipt.backup_id,
            sequence: receipt.sequence,
        }]);
        Ok(receipt)
    }

    // --- Comparison ---

    /// Compare two snapshots; `a` is the reference side.
    pub fn diff(a: &Snapshot, b: &Snapshot) -> SnapshotDiff {
        diff(a, b)
    }

    /// Compare two archived snapshots by ID; `a` is the reference side.
    pub fn diff_snapshots(&self, a: SnapshotId, b: SnapshotId) -> Result<SnapshotDiff> {
        let inner = self.inner.read();
        let a = inner.archive.get(a).ok_or(StoreError::SnapshotNotFound(a))?;
        let b = inner.archive.get(b).ok_or(StoreError::SnapshotNotFound(b))?;
        Ok(diff_archived(&a, &b))
    }

    /// Compare the live state (reference side) against a snapshot.
    pub fn diff_with_current(&self, id: SnapshotId) -> Result<SnapshotDiff> {
        let inner = self.inner.read();
        let snapshot = inner
            .archive
            .get(id)
            .ok_or(StoreError::SnapshotNotFound(id))?;
        Ok(diff_entries(inner.state.as_map(), &snapshot.data))
    }

    // --- Subscriptions ---

    /// Call `listener` after every committed change.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.subscriptions.add_listener(listener)
    }

    /// Receive matching events on a bounded channel.
    pub fn subscribe_channel(&self, filter: SubscriptionFilter) -> SubscriptionHandle {
        self.subscriptions.subscribe(SubscriptionConfig {
            buffer_size: self.config.event_buffer_size,
            filter,
        })
    }

    pub fn unsubscribe_channel(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    // --- History ---

    /// Full operation history, oldest first.
    pub fn get_operation_log(&self) -> Vec<Operation> {
        self.inner.read().log.to_vec()
    }

    /// Operations logged after `sequence`, oldest first.
    pub fn operations_since(&self, sequence: Sequence) -> Vec<Operation> {
        self.inner.read().log.since(sequence)
    }

    /// Operations that named a key, oldest first.
    pub fn key_history(&self, key: &str) -> Vec<Operation> {
        self.inner.read().log.for_key(key)
    }

    /// Sequence of the newest operation.
    pub fn head(&self) -> Sequence {
        self.inner.read().log.head()
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            entry_count: inner.state.len(),
            snapshot_count: inner.archive.len(),
            operation_count: inner.log.len(),
            operations_by_kind: inner.log.counts_by_kind(),
        }
    }

    /// Everything the store holds, as pretty-printed JSON for display.
    pub fn export_json(&self) -> Result<String> {
        let inner = self.inner.read();
        let view = StoreView {
            entries: inner.state.entries(),
            snapshots: inner.archive.iter().map(|s| s.as_ref()).collect(),
            operations: inner.log.iter().collect(),
            current_snapshot: inner.current_snapshot,
        };
        Ok(serde_json::to_string_pretty(&view)?)
    }

    /// Rebuild state by replaying the whole operation log.
    pub fn replay_state(&self) -> Result<HashMap<String, Entry>> {
        let inner = self.inner.read();
        Ok(replay(inner.log.iter(), &inner.archive)?.into_map())
    }

    /// Check the store's structural invariants:
    /// - replaying the log reproduces the live state,
    /// - snapshot operations and archived snapshots match one to one,
    /// - every archived snapshot still hashes to its creation digest.
    pub fn check_invariants(&self) -> Result<()> {
        let inner = self.inner.read();

        let replayed = replay(inner.log.iter(), &inner.archive)?;
        if replayed.as_map() != inner.state.as_map() {
            return Err(StoreError::Corruption(
                "replaying the operation log does not reproduce the live state".to_string(),
            ));
        }

        if inner.log.count(OperationKind::Snapshot) != inner.archive.len() {
            return Err(StoreError::Corruption(format!(
                "{} snapshot operations but {} archived snapshots",
                inner.log.count(OperationKind::Snapshot),
                inner.archive.len()
            )));
        }

        for snapshot in inner.archive.iter() {
            if inner.log.snapshot_operation(snapshot.id).is_none() {
                return Err(StoreError::Corruption(format!(
                    "snapshot {} has no snapshot operation",
                    snapshot.id
                )));
            }
            if !snapshot.verify() {
                return Err(StoreError::Corruption(format!(
                    "snapshot {} no longer matches its digest",
                    snapshot.id
                )));
            }
        }

        Ok(())
    }

    // --- Demo ---

    /// Overwrite a random selection of keys with garbage.
    ///
    /// A protective snapshot is taken first; if it cannot be created nothing
    /// is corrupted. Then `max(1, floor(keys * corruption_ratio))` keys are
    /// drawn with replacement, so fewer distinct keys may be hit than there
    /// were draws. Each draw is an ordinary write with its own log entry and
    /// notification. An empty store only gets the protective snapshot.
    pub fn simulate_corruption(&self) -> Result<CorruptionReport> {
        let (report, events) = {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let mut events = Vec::new();

            let (backup, event) = inner.snapshot(
                PRE_CORRUPTION_SNAPSHOT_NAME.to_string(),
                Some(PRE_CORRUPTION_SNAPSHOT_DESCRIPTION.to_string()),
                BTreeSet::new(),
                self.clock.now(),
            )?;
            events.push(event);

            let keys = inner.state.keys();
            let mut draws = Vec::new();
            if !keys.is_empty() {
                for _ in 0..corruption_draws(keys.len(), self.config.corruption_ratio) {
                    let key = &keys[inner.rng.gen_range(0..keys.len())];
                    let value = inner.corruption_value();
                    events.push(inner.write(key, &value, self.clock.now()));
                    draws.push(key.clone());
                }
            }

            (
                CorruptionReport {
                    backup_id: backup.id,
                    draws,
                },
                events,
            )
        };

        info!(
            backup = %report.backup_id,
            draws = report.draws.len(),
            "simulated corruption"
        );
        self.subscriptions.publish(events);
        Ok(report)
    }
}
