//! Multi-threaded access tests.

use rewind::{OperationKind, Store, StoreConfig, StoreEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn shared_store() -> Arc<Store> {
    Arc::new(
        Store::new(StoreConfig {
            rng_seed: Some(9),
            ..StoreConfig::empty()
        })
        .unwrap(),
    )
}

#[test]
fn test_parallel_writers_are_all_logged() {
    let store = shared_store();
    let threads = 8;
    let writes_per_thread = 200;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..writes_per_thread {
                    store
                        .write(&format!("t{}:k{}", t, i % 10), &i.to_string())
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = store.stats();
    assert_eq!(stats.operations_by_kind[&OperationKind::Write], threads * writes_per_thread);
    assert_eq!(stats.entry_count, threads * 10);

    let log = store.get_operation_log();
    for (i, op) in log.iter().enumerate() {
        assert_eq!(op.sequence.0, i as u64 + 1);
    }

    store.check_invariants().unwrap();
}

#[test]
fn test_restore_is_atomic_to_readers() {
    let store = shared_store();

    // Two snapshots whose keys always move together.
    store.write("left", "A").unwrap();
    store.write("right", "A").unwrap();
    let a = store.create_snapshot("A", None).unwrap();
    store.write("left", "B").unwrap();
    store.write("right", "B").unwrap();
    let b = store.create_snapshot("B", None).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..200 {
                let target = if i % 2 == 0 { a } else { b };
                store.restore_snapshot(target).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    let entries: HashMap<_, _> = store
                        .list_entries()
                        .into_iter()
                        .map(|e| (e.key, e.value))
                        .collect();
                    assert_eq!(entries.get("left"), entries.get("right"));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    // Every restore left exactly one backup and one restore entry behind.
    let stats = store.stats();
    assert_eq!(stats.operations_by_kind[&OperationKind::Restore], 200);
    assert_eq!(stats.snapshot_count, 2 + 200);
    store.check_invariants().unwrap();
}

#[test]
fn test_every_event_delivered_under_contention() {
    let store = shared_store();
    let delivered = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&delivered);
    store.subscribe(move |event| {
        if matches!(event, StoreEvent::Written { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100 {
                    store.write(&format!("{}-{}", t, i), "v").unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // A thread can hand its events to whichever thread is dispatching, so
    // wait until the queue has drained.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while delivered.load(Ordering::SeqCst) < 400 && std::time::Instant::now() < deadline {
        thread::yield_now();
    }
    assert_eq!(delivered.load(Ordering::SeqCst), 400);
}

#[test]
fn test_concurrent_corruption_and_snapshots() {
    let store = Arc::new(
        Store::new(StoreConfig {
            rng_seed: Some(1),
            ..Default::default()
        })
        .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..20 {
                    if (t + i) % 3 == 0 {
                        store.simulate_corruption().unwrap();
                    } else {
                        store.create_snapshot(&format!("{}-{}", t, i), None).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    store.check_invariants().unwrap();
}
