// Dispatch Integration Tests
//
// Two-phase replay of catalog commands from the coordinator to workers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use catalogd::catalog::{CatalogError, Namespace, NamespaceAcl};
use catalogd::cluster::{DispatchState, LocalCluster, WorkerTransport};
use catalogd::command::Session;
use catalogd::transaction::LockTag;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn failing_cluster(violation: bool, aborts: Arc<AtomicUsize>) -> LocalCluster {
    cluster_builder(3)
        .wrap_transport(move |node, inner| -> Box<dyn WorkerTransport> {
            if node == 2 {
                let mut failing = FailingTransport::new(inner, aborts.clone());
                failing.violation = violation;
                Box::new(failing)
            } else {
                inner
            }
        })
        .build()
        .unwrap()
}

#[test]
fn test_command_sequence_leaves_nodes_identical() {
    let cluster = start_cluster(3);
    let alice = Session::new(ALICE);
    let script = [
        "define < leftarg=int4 rightarg=int4 procedure=int4lt commutator=> negator=>=",
        "define > leftarg=int4 rightarg=int4 procedure=int4gt commutator=< negator=<=",
        "define = leftarg=int4 rightarg=int4 procedure=int4eq commutator== hashes merges",
        "remove > int4 int4",
        "define > leftarg=int4 rightarg=int4 procedure=int4gt commutator=<",
    ];
    for line in script {
        cluster.execute(&alice, &statement(line)).unwrap();
        assert_consistent(&cluster);
    }
    cluster
        .execute(&Session::new(CAROL), &statement("alter-owner = int4 int4 bob"))
        .unwrap();
    assert_consistent(&cluster);
    assert!(cluster.is_consistent());
}

#[test]
fn test_gxids_increase_and_every_worker_is_reached() {
    let cluster = start_cluster(2);
    let session = Session::new(ALICE);
    let first = cluster
        .execute(&session, &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();
    let second = cluster
        .execute(&session, &define_int4(">", &[("procedure", "int4gt")]))
        .unwrap();
    assert!(second.gxid > first.gxid);
    assert_eq!(first.dispatched_to, 2);
    assert_eq!(
        first.trail,
        vec![
            DispatchState::Resolving,
            DispatchState::LocallyApplied,
            DispatchState::Dispatching,
            DispatchState::Committed
        ]
    );
    assert_eq!(cluster.coordinator().worker_ids(), vec![1, 2]);
}

#[test]
fn test_worker_failure_aborts_everywhere() {
    let aborts = Arc::new(AtomicUsize::new(0));
    let cluster = failing_cluster(false, aborts.clone());
    let before = cluster.snapshots();

    let result = cluster.execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt"), ("commutator", ">")]));
    match result {
        Err(CatalogError::DispatchFailure { node, reason }) => {
            assert_eq!(node, 2);
            assert_eq!(reason, "injected failure");
        }
        other => panic!("Expected DispatchFailure, got {:?}", other),
    }

    assert_eq!(cluster.snapshots(), before);
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    let trail = cluster.coordinator().last_trail();
    assert!(trail.contains(&DispatchState::Dispatching));
    assert_eq!(trail.last(), Some(&DispatchState::Aborted));
    assert_eq!(cluster.coordinator().transactions().locks().held_count(), 0);
    assert!(cluster.coordinator().transactions().get_active_transaction_ids().is_empty());

    // The cluster stays usable for commands that do not change anything
    let skipped = cluster
        .execute(&Session::new(ALICE), &statement("remove < int4 int4 if-exists"))
        .unwrap();
    assert_eq!(skipped.dispatched_to, 0);
}

#[test]
fn test_worker_violation_surfaces_as_violation() {
    let aborts = Arc::new(AtomicUsize::new(0));
    let cluster = failing_cluster(true, aborts.clone());

    let result = cluster.execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]));
    assert!(matches!(result, Err(CatalogError::ProtocolViolation(_))));
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    for (_, snapshot) in cluster.snapshots() {
        assert!(snapshot.operators.is_empty());
    }
}

#[test]
fn test_unresponsive_worker_times_out() {
    let cluster = LocalCluster::builder(test_config(2).with_dispatch_timeout(Duration::from_millis(200)))
        .setup(|_, catalog| create_roles(catalog))
        .wrap_transport(|node, inner| -> Box<dyn WorkerTransport> {
            if node == 1 {
                Box::new(SlowTransport {
                    inner,
                    delay: Duration::from_secs(1),
                })
            } else {
                inner
            }
        })
        .build()
        .unwrap();

    let result = cluster.execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]));
    match result {
        Err(CatalogError::DispatchFailure { node, reason }) => {
            assert_eq!(node, 1);
            assert!(reason.contains("did not answer"), "{}", reason);
        }
        other => panic!("Expected DispatchFailure, got {:?}", other),
    }
    for (_, snapshot) in cluster.snapshots() {
        assert!(snapshot.operators.is_empty());
    }
}

#[test]
fn test_slow_worker_within_deadline_commits() {
    let cluster = cluster_builder(2)
        .wrap_transport(|_, inner| -> Box<dyn WorkerTransport> {
            Box::new(SlowTransport {
                inner,
                delay: Duration::from_millis(50),
            })
        })
        .build()
        .unwrap();

    let result = cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();
    assert_eq!(result.dispatched_to, 2);
    assert_consistent(&cluster);
}

#[test]
fn test_worker_missing_schema_rolls_back() {
    let cluster = cluster_builder(2)
        .setup(|node, catalog| {
            if node == 2 {
                return Ok(());
            }
            catalog.create_namespace(Namespace::new(30000, "sales", ALICE, NamespaceAcl::new()))
        })
        .build()
        .unwrap();

    let result = cluster.execute(
        &Session::new(ALICE),
        &statement("define sales.< leftarg=int4 rightarg=int4 procedure=int4lt"),
    );
    match result {
        Err(CatalogError::DispatchFailure { node, reason }) => {
            assert_eq!(node, 2);
            assert!(reason.contains("sales"), "{}", reason);
        }
        other => panic!("Expected DispatchFailure, got {:?}", other),
    }
    for (_, snapshot) in cluster.snapshots() {
        assert!(snapshot.operators.is_empty());
    }
}

#[test]
fn test_late_prepare_on_a_stalled_worker_is_rolled_back() {
    let taps: Arc<Mutex<Vec<Arc<dyn WorkerTransport>>>> = Arc::new(Mutex::new(Vec::new()));
    let tapped = taps.clone();
    let cluster = LocalCluster::builder(test_config(2).with_dispatch_timeout(Duration::from_millis(200)))
        .setup(|_, catalog| create_roles(catalog))
        .wrap_transport(move |node, inner| -> Box<dyn WorkerTransport> {
            let shared: Arc<dyn WorkerTransport> = Arc::from(inner);
            if node == 2 {
                tapped.lock().unwrap().push(shared.clone());
            }
            Box::new(SharedTransport(shared))
        })
        .build()
        .unwrap();
    let node2 = taps.lock().unwrap()[0].clone();
    let before = cluster.snapshots();

    // Hold the operator's key on node 2 so its worker thread blocks in prepare
    let worker_locks = cluster.locks(2).unwrap().clone();
    let tag = LockTag::Operator(int4_key("<"));
    assert!(worker_locks.acquire(u32::MAX, &tag, Duration::ZERO).unwrap());
    let holder = {
        let (locks, tag) = (worker_locks.clone(), tag.clone());
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(800));
            locks.release_all(u32::MAX, &[tag]);
        })
    };

    let define = define_int4("<", &[("procedure", "int4lt"), ("commutator", ">")]);
    match cluster.execute(&Session::new(ALICE), &define) {
        Err(CatalogError::DispatchFailure { node, reason }) => {
            assert_eq!(node, 2);
            assert!(reason.contains("did not answer"), "{}", reason);
        }
        other => panic!("Expected DispatchFailure, got {:?}", other),
    }
    holder.join().unwrap();

    // The worker finishes the prepare nobody waits for, then the queued abort
    drain_worker(node2.as_ref());
    assert_eq!(cluster.snapshots(), before);
    assert_eq!(worker_locks.held_count(), 0);

    let result = cluster.execute(&Session::new(ALICE), &define).unwrap();
    assert_eq!(result.dispatched_to, 2);
    assert_consistent(&cluster);
}
