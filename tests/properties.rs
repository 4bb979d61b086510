//! Property tests over random operation sequences.

use proptest::prelude::*;
use rewind::{diff, OperationKind, SnapshotDiff, Store, StoreConfig};
use std::collections::HashMap;

fn test_store() -> Store {
    Store::new(StoreConfig {
        rng_seed: Some(0),
        ..StoreConfig::empty()
    })
    .unwrap()
}

#[derive(Clone, Debug)]
enum Op {
    Write(String, String),
    Delete(String),
    Clear,
    Snapshot,
    Restore(usize),
    Corrupt,
}

fn key() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d", "e"]).prop_map(str::to_string)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (key(), "[a-z0-9]{0,6}").prop_map(|(k, v)| Op::Write(k, v)),
        3 => key().prop_map(Op::Delete),
        1 => Just(Op::Clear),
        2 => Just(Op::Snapshot),
        2 => any::<usize>().prop_map(Op::Restore),
        1 => Just(Op::Corrupt),
    ]
}

fn run(store: &Store, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Write(k, v) => store.write(k, v).unwrap(),
            Op::Delete(k) => {
                store.delete(k);
            }
            Op::Clear => store.clear_all(),
            Op::Snapshot => {
                store.create_snapshot("p", None).unwrap();
            }
            Op::Restore(pick) => {
                let snapshots = store.get_snapshots();
                if !snapshots.is_empty() {
                    let id = snapshots[pick % snapshots.len()].id;
                    store.restore_snapshot(id).unwrap();
                }
            }
            Op::Corrupt => {
                store.simulate_corruption().unwrap();
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_write_then_read(k in "[a-zA-Z0-9:_]{1,12}", v in ".*") {
        let store = test_store();
        store.write(&k, &v).unwrap();
        prop_assert_eq!(store.read(&k), Some(v));
    }

    #[test]
    fn prop_delete_absent_is_silent(ops in prop::collection::vec(op(), 0..30)) {
        let store = test_store();
        run(&store, &ops);

        let absent = "never-written";
        let before = store.get_operation_log().len();
        prop_assert!(!store.delete(absent));
        prop_assert!(!store.delete(absent));
        prop_assert_eq!(store.get_operation_log().len(), before);
    }

    #[test]
    fn prop_snapshots_are_immutable(
        before in prop::collection::vec(op(), 0..20),
        after in prop::collection::vec(op(), 0..40),
    ) {
        let store = test_store();
        run(&store, &before);

        let id = store.create_snapshot("frozen", None).unwrap();
        let frozen: HashMap<_, _> = store.get_snapshot(id).unwrap().data.clone();

        run(&store, &after);

        let snapshot = store.get_snapshot(id).unwrap();
        prop_assert_eq!(&snapshot.data, &frozen);
        prop_assert!(snapshot.verify());
    }

    #[test]
    fn prop_restore_backup_equals_prior_state(
        ops in prop::collection::vec(op(), 1..30),
        pick in any::<usize>(),
    ) {
        let store = test_store();
        store.create_snapshot("base", None).unwrap();
        run(&store, &ops);

        let prior = store.list_entries();
        let snapshots = store.get_snapshots();
        let target = snapshots[pick % snapshots.len()].id;

        let receipt = store.restore_snapshot(target).unwrap();
        let mut backup: Vec<_> = store
            .get_snapshot(receipt.backup_id)
            .unwrap()
            .data
            .values()
            .cloned()
            .collect();
        backup.sort_by(|a, b| a.key.cmp(&b.key));
        prop_assert_eq!(backup, prior);
    }

    #[test]
    fn prop_diff_antisymmetry(
        first in prop::collection::vec(op(), 0..20),
        second in prop::collection::vec(op(), 0..20),
    ) {
        let store = test_store();
        run(&store, &first);
        let a = store.create_snapshot("a", None).unwrap();
        run(&store, &second);
        let b = store.create_snapshot("b", None).unwrap();

        let a = store.get_snapshot(a).unwrap();
        let b = store.get_snapshot(b).unwrap();
        let ab = diff(&a, &b);
        let ba = diff(&b, &a);

        prop_assert_eq!(&ab.added, &ba.removed);
        prop_assert_eq!(&ab.removed, &ba.added);
        prop_assert_eq!(&ab.modified, &ba.modified);
        prop_assert_eq!(diff(&a, &a), SnapshotDiff::default());
    }

    #[test]
    fn prop_write_count_per_key(ops in prop::collection::vec(op(), 0..50)) {
        let store = test_store();
        let mut expected: HashMap<String, usize> = HashMap::new();

        for op in &ops {
            if let Op::Write(k, _) = op {
                *expected.entry(k.clone()).or_insert(0) += 1;
            }
            if let Op::Corrupt = op {
                // Corruption writes go through the same path; count them
                // from its report instead.
                let report = store.simulate_corruption().unwrap();
                for k in report.draws {
                    *expected.entry(k).or_insert(0) += 1;
                }
                continue;
            }
            run(&store, std::slice::from_ref(op));
        }

        let mut logged: HashMap<String, usize> = HashMap::new();
        for entry in store.get_operation_log() {
            if entry.kind == OperationKind::Write {
                *logged.entry(entry.key.unwrap()).or_insert(0) += 1;
            }
        }
        prop_assert_eq!(logged, expected);
    }

    #[test]
    fn prop_invariants_hold(ops in prop::collection::vec(op(), 0..60)) {
        let store = test_store();
        run(&store, &ops);
        prop_assert!(store.check_invariants().is_ok());
    }
}
