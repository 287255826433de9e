// Operator Owner Integration Tests

use catalogd::catalog::{CatalogError, DependencyKind, ObjectAddress, ObjectClass, Role};
use catalogd::cluster::LocalCluster;
use catalogd::command::{CommandStatus, Session};

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn owner_edges(cluster: &LocalCluster, node: u16, oid: u32) -> Vec<ObjectAddress> {
    cluster
        .catalog(node)
        .unwrap()
        .edges_from(&ObjectAddress::operator(oid))
        .into_iter()
        .filter(|e| e.kind == DependencyKind::Owns && e.referenced.class == ObjectClass::Role)
        .map(|e| e.referenced)
        .collect()
}

#[test]
fn test_transfer_to_current_owner_changes_nothing() {
    let cluster = start_cluster(2);
    let session = Session::new(ALICE);
    cluster.execute(&session, &define_int4("<", &[("procedure", "int4lt")])).unwrap();
    let before = cluster.snapshots();

    let result = cluster.execute(&session, &statement("alter-owner < int4 int4 alice")).unwrap();
    assert_eq!(result.outcome.status, CommandStatus::OwnerUnchanged);
    assert!(!result.outcome.changed());
    assert_eq!(result.dispatched_to, 0);
    assert_eq!(cluster.snapshots(), before);
}

#[test]
fn test_superuser_transfers_ownership_everywhere() {
    let cluster = start_cluster(2);
    let defined = cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();
    let oid = defined.outcome.object();

    let result = cluster
        .execute(&Session::new(CAROL), &statement("alter-owner < int4 int4 bob"))
        .unwrap();
    assert_eq!(result.outcome.status, CommandStatus::OwnerChanged);
    assert_eq!(result.outcome.owner, Some(BOB));
    assert_eq!(result.dispatched_to, 2);

    for node in cluster.node_ids() {
        assert_eq!(cluster.catalog(node).unwrap().operator(oid).unwrap().owner(), BOB);
        assert_eq!(owner_edges(&cluster, node, oid), vec![ObjectAddress::role(BOB)]);
    }
    assert_consistent(&cluster);

    // Now a no-op for the new owner
    let again = cluster
        .execute(&Session::new(CAROL), &statement("alter-owner < int4 int4 bob"))
        .unwrap();
    assert_eq!(again.outcome.status, CommandStatus::OwnerUnchanged);
}

#[test]
fn test_owner_must_be_member_of_new_owner() {
    let cluster = cluster_builder(1)
        .setup(|_, catalog| {
            catalog.create_role(Role::new(20010, "dave", false))?;
            catalog.grant_role(ALICE, 20010)
        })
        .build()
        .unwrap();
    cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();

    let denied = cluster.execute(&Session::new(ALICE), &statement("alter-owner < int4 int4 bob"));
    match denied {
        Err(e @ CatalogError::PermissionDenied(_)) => assert!(e.to_string().contains("must be member of role bob")),
        other => panic!("Expected PermissionDenied, got {:?}", other),
    }

    // alice is a member of dave
    let result = cluster
        .execute(&Session::new(ALICE), &statement("alter-owner < int4 int4 dave"))
        .unwrap();
    assert_eq!(result.outcome.owner, Some(20010));
    assert_consistent(&cluster);
}

#[test]
fn test_non_owner_cannot_transfer() {
    let cluster = start_cluster(1);
    cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();
    let denied = cluster.execute(&Session::new(BOB), &statement("alter-owner < int4 int4 bob"));
    match denied {
        Err(e @ CatalogError::PermissionDenied(_)) => assert!(e.to_string().contains("must be owner of")),
        other => panic!("Expected PermissionDenied, got {:?}", other),
    }
    let row = int4_operator(cluster.catalog(1).unwrap(), "<").unwrap();
    assert_eq!(row.owner(), ALICE);
}

#[test]
fn test_unknown_operator_or_role() {
    let cluster = start_cluster(1);
    let missing = cluster.execute(&Session::new(CAROL), &statement("alter-owner < int4 int4 bob"));
    match missing {
        Err(e @ CatalogError::NotFound(_)) => assert_eq!(e.to_string(), "operator <(int4,int4) does not exist"),
        other => panic!("Expected NotFound, got {:?}", other),
    }

    cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();
    let no_role = cluster.execute(&Session::new(CAROL), &statement("alter-owner < int4 int4 nobody"));
    assert!(matches!(no_role, Err(CatalogError::NotFound(_))));
}

#[test]
fn test_worker_resolving_a_different_role_is_violation() {
    // On node 2, "bob" is a different role than everywhere else
    let cluster = LocalCluster::builder(test_config(2))
        .setup(|node, catalog| {
            catalog.create_role(Role::new(ALICE, "alice", false))?;
            catalog.create_role(Role::new(CAROL, "carol", true))?;
            let bob = if node == 2 { 20099 } else { BOB };
            catalog.create_role(Role::new(bob, "bob", false))
        })
        .build()
        .unwrap();
    let defined = cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();

    let result = cluster.execute(&Session::new(CAROL), &statement("alter-owner < int4 int4 bob"));
    assert!(matches!(result, Err(CatalogError::ProtocolViolation(_))));
    for node in cluster.node_ids() {
        let row = cluster.catalog(node).unwrap().operator(defined.outcome.object()).unwrap();
        assert_eq!(row.owner(), ALICE, "node {}", node);
    }
    assert_consistent(&cluster);
}
