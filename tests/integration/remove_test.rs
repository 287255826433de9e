// Remove Operator Integration Tests

use catalogd::catalog::bootstrap::{BOOL_OID, INT4_OID, PUBLIC_NAMESPACE};
use catalogd::catalog::{CatalogError, DependencyEdge, DependencyKind, Function, ObjectAddress};
use catalogd::cluster::{DispatchState, LocalCluster};
use catalogd::command::{CommandStatus, Session};
use catalogd::common::types::{Oid, INVALID_OID};

#[path = "../common/mod.rs"]
mod common;
use common::*;

const USES_LT: Oid = 30000;

// Define `<` and a function depending on it on every node
fn cluster_with_dependent(kind: DependencyKind) -> (LocalCluster, Oid) {
    let cluster = start_cluster(2);
    let result = cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();
    let lt = result.outcome.object();
    for node in cluster.node_ids() {
        let catalog = cluster.catalog(node).unwrap();
        catalog
            .create_function(Function::new(USES_LT, "uses_lt", PUBLIC_NAMESPACE, ALICE, vec![INT4_OID], BOOL_OID))
            .unwrap();
        catalog
            .record_dependency(DependencyEdge::new(
                ObjectAddress::function(USES_LT),
                ObjectAddress::operator(lt),
                kind,
            ))
            .unwrap();
    }
    (cluster, lt)
}

#[test]
fn test_missing_ok_remove_is_a_notice() {
    let cluster = start_cluster(2);
    let before = cluster.snapshots();
    let result = cluster
        .execute(&Session::new(ALICE), &statement("remove < int4 int4 if-exists"))
        .unwrap();
    assert_eq!(result.outcome.status, CommandStatus::Skipped);
    assert_eq!(result.outcome.notices.len(), 1);
    assert_eq!(
        result.outcome.notices[0].to_string(),
        "NOTICE:  operator < does not exist, skipping"
    );
    assert_eq!(result.dispatched_to, 0);
    assert_eq!(cluster.snapshots(), before);

    // Unknown operand types are a skip too
    let result = cluster
        .execute(&Session::new(ALICE), &statement("remove < widget int4 if-exists"))
        .unwrap();
    assert_eq!(result.outcome.status, CommandStatus::Skipped);
}

#[test]
fn test_missing_remove_is_an_error() {
    let cluster = start_cluster(1);
    match cluster.execute(&Session::new(ALICE), &statement("remove < int4 int4")) {
        Err(e @ CatalogError::NotFound(_)) => assert_eq!(e.to_string(), "operator <(int4,int4) does not exist"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_remove_clears_partner_links_everywhere() {
    let cluster = start_cluster(2);
    let session = Session::new(ALICE);
    cluster
        .execute(&session, &define_int4("<", &[("procedure", "int4lt"), ("commutator", ">"), ("negator", ">=")]))
        .unwrap();
    cluster
        .execute(&session, &define_int4(">", &[("procedure", "int4gt"), ("commutator", "<")]))
        .unwrap();

    let result = cluster.execute(&session, &statement("remove < int4 int4")).unwrap();
    assert_eq!(result.outcome.status, CommandStatus::Removed);
    assert_eq!(result.dispatched_to, 2);

    for node in cluster.node_ids() {
        let catalog = cluster.catalog(node).unwrap();
        assert!(int4_operator(catalog, "<").is_none());
        assert_eq!(int4_operator(catalog, ">").unwrap().commutator(), INVALID_OID);
        // The negator shell survives, without its back-link
        let ge = int4_operator(catalog, ">=").unwrap();
        assert!(ge.is_shell());
        assert_eq!(ge.negator(), INVALID_OID);
        assert!(catalog
            .edges()
            .iter()
            .all(|e| !e.mentions(&ObjectAddress::operator(result.outcome.object()))));
    }
    assert_consistent(&cluster);
}

#[test]
fn test_restrict_refuses_when_dependents_exist() {
    let (cluster, lt) = cluster_with_dependent(DependencyKind::Normal);
    let before = cluster.snapshots();

    match cluster.execute(&Session::new(ALICE), &statement("remove < int4 int4")) {
        Err(CatalogError::DependentObjectsExist { object, dependents }) => {
            assert_eq!(object, "operator public.<(int4,int4)");
            assert_eq!(dependents, vec!["function public.uses_lt(int4)".to_string()]);
        }
        other => panic!("Expected DependentObjectsExist, got {:?}", other),
    }
    assert_eq!(
        cluster.coordinator().last_trail(),
        vec![DispatchState::Resolving, DispatchState::Aborted]
    );
    assert_eq!(cluster.snapshots(), before);
    assert!(cluster.catalog(1).unwrap().operator(lt).is_some());
}

#[test]
fn test_cascade_removes_dependents_everywhere() {
    let (cluster, lt) = cluster_with_dependent(DependencyKind::Normal);

    let result = cluster
        .execute(&Session::new(ALICE), &statement("remove < int4 int4 cascade"))
        .unwrap();
    assert_eq!(result.outcome.status, CommandStatus::Removed);
    assert_eq!(
        result.outcome.notices.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
        vec!["NOTICE:  drop cascades to function public.uses_lt(int4)".to_string()]
    );

    for node in cluster.node_ids() {
        let catalog = cluster.catalog(node).unwrap();
        assert!(catalog.operator(lt).is_none(), "node {}", node);
        assert!(catalog.function(USES_LT).is_none(), "node {}", node);
        assert!(catalog
            .edges()
            .iter()
            .all(|e| !e.mentions(&ObjectAddress::function(USES_LT))));
    }
    assert_consistent(&cluster);
}

#[test]
fn test_auto_dependents_go_without_cascade() {
    let (cluster, lt) = cluster_with_dependent(DependencyKind::Auto);

    let result = cluster
        .execute(&Session::new(ALICE), &statement("remove < int4 int4"))
        .unwrap();
    assert!(result.outcome.notices.is_empty());
    for node in cluster.node_ids() {
        let catalog = cluster.catalog(node).unwrap();
        assert!(catalog.operator(lt).is_none());
        assert!(catalog.function(USES_LT).is_none());
    }
    assert_consistent(&cluster);
}

#[test]
fn test_only_owner_may_remove() {
    let cluster = start_cluster(1);
    cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt")]))
        .unwrap();

    let denied = cluster.execute(&Session::new(BOB), &statement("remove < int4 int4"));
    assert!(matches!(denied, Err(CatalogError::PermissionDenied(_))));
    assert!(int4_operator(cluster.catalog(1).unwrap(), "<").is_some());

    cluster
        .execute(&Session::new(CAROL), &statement("remove < int4 int4"))
        .unwrap();
    assert!(int4_operator(cluster.catalog(1).unwrap(), "<").is_none());
    assert_consistent(&cluster);
}

#[test]
fn test_removing_a_shell() {
    let cluster = start_cluster(1);
    cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt"), ("commutator", ">")]))
        .unwrap();

    cluster
        .execute(&Session::new(ALICE), &statement("remove > int4 int4"))
        .unwrap();
    let lt = int4_operator(cluster.catalog(1).unwrap(), "<").unwrap();
    assert_eq!(lt.commutator(), INVALID_OID);
    assert_consistent(&cluster);
}
