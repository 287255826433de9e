// Define Operator Integration Tests
//
// Defining operators across a cluster: forward references through shells,
// identifier symmetry, permissions and definition errors.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use catalogd::catalog::bootstrap::BOOL_OID;
use catalogd::catalog::{CatalogError, Namespace, NamespaceAcl, ObjectAddress};
use catalogd::cluster::{DispatchState, LocalCluster, WorkerTransport};
use catalogd::command::{CommandStatus, Session};
use catalogd::common::types::{oid_is_valid, FIRST_NORMAL_OID};

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[test]
fn test_forward_reference_creates_shell_on_every_node() {
    let cluster = start_cluster(2);
    let session = Session::new(ALICE);

    let result = cluster
        .execute(&session, &define_int4("<", &[("procedure", "int4lt"), ("commutator", ">")]))
        .unwrap();
    assert_eq!(result.outcome.status, CommandStatus::Defined);
    assert_eq!(result.outcome.assignment.commutator, Some(FIRST_NORMAL_OID));
    assert_eq!(result.outcome.assignment.operator, FIRST_NORMAL_OID + 1);
    assert_eq!(result.dispatched_to, 2);

    for node in cluster.node_ids() {
        let catalog = cluster.catalog(node).unwrap();
        let lt = int4_operator(catalog, "<").unwrap();
        let gt = int4_operator(catalog, ">").unwrap();
        assert!(lt.is_complete(), "node {}", node);
        assert!(gt.is_shell(), "node {}", node);
        assert_eq!(lt.commutator(), gt.oid());
        assert_eq!(gt.commutator(), lt.oid());
        assert_eq!(lt.result(), BOOL_OID);
    }
    assert_consistent(&cluster);
}

#[test]
fn test_partner_definition_reuses_reserved_oid() {
    let cluster = start_cluster(2);
    let session = Session::new(ALICE);

    cluster
        .execute(&session, &define_int4("<", &[("procedure", "int4lt"), ("commutator", ">")]))
        .unwrap();
    let reserved = int4_operator(cluster.coordinator().catalog(), ">").unwrap().oid();

    let result = cluster
        .execute(&session, &define_int4(">", &[("procedure", "int4gt"), ("commutator", "<")]))
        .unwrap();
    assert_eq!(result.outcome.object(), reserved);

    for node in cluster.node_ids() {
        let catalog = cluster.catalog(node).unwrap();
        assert_eq!(catalog.operators_named(">").len(), 1);
        let gt = int4_operator(catalog, ">").unwrap();
        let lt = int4_operator(catalog, "<").unwrap();
        assert_eq!(gt.oid(), reserved);
        assert!(gt.is_complete());
        assert_eq!(gt.commutator(), lt.oid());
        assert_eq!(lt.commutator(), gt.oid());
    }
    assert_consistent(&cluster);
}

#[test]
fn test_comparison_family_is_symmetric_in_any_order() {
    let family = [
        ("<", "int4lt", ">", ">="),
        (">", "int4gt", "<", "<="),
        ("<=", "int4le", ">=", ">"),
        (">=", "int4ge", "<=", "<"),
    ];

    for seed in 0..6u64 {
        let cluster = start_cluster(2);
        let session = Session::new(ALICE);
        let mut order = family.to_vec();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        for (name, procedure, commutator, negator) in &order {
            let stmt = define_int4(
                name,
                &[("procedure", procedure), ("commutator", commutator), ("negator", negator)],
            );
            cluster.execute(&session, &stmt).unwrap();
        }

        let catalog = cluster.coordinator().catalog();
        assert_eq!(catalog.operators().len(), 4, "seed {}", seed);
        for (name, _, commutator, negator) in &family {
            let row = int4_operator(catalog, name).unwrap();
            let com = int4_operator(catalog, commutator).unwrap();
            let neg = int4_operator(catalog, negator).unwrap();
            assert!(row.is_complete(), "seed {}: {} left as shell", seed, name);
            assert_eq!(row.commutator(), com.oid(), "seed {}: {}", seed, name);
            assert_eq!(com.commutator(), row.oid(), "seed {}: {}", seed, name);
            assert_eq!(row.negator(), neg.oid(), "seed {}: {}", seed, name);
            assert_eq!(neg.negator(), row.oid(), "seed {}: {}", seed, name);
        }
        assert_consistent(&cluster);
    }
}

#[test]
fn test_self_commutator_points_at_itself() {
    let cluster = start_cluster(1);
    let result = cluster
        .execute(&Session::new(ALICE), &define_int4("=", &[("procedure", "int4eq"), ("commutator", "=")]))
        .unwrap();
    assert_eq!(result.outcome.assignment.commutator, Some(result.outcome.object()));

    let eq = int4_operator(cluster.catalog(1).unwrap(), "=").unwrap();
    assert_eq!(eq.commutator(), eq.oid());
    assert_eq!(cluster.coordinator().catalog().operators().len(), 1);
    assert_consistent(&cluster);
}

#[test]
fn test_operator_cannot_negate_itself() {
    let cluster = start_cluster(1);
    let result = cluster.execute(&Session::new(ALICE), &define_int4("=", &[("procedure", "int4eq"), ("negator", "=")]));
    assert!(matches!(result, Err(CatalogError::InvalidDefinition(_))));
    assert!(cluster.coordinator().catalog().operators().is_empty());
}

#[test]
fn test_definition_errors_never_reach_workers() {
    let cluster = start_cluster(2);
    let session = Session::new(ALICE);

    let missing_procedure = cluster.execute(&session, &define_int4("<", &[]));
    match missing_procedure {
        Err(e @ CatalogError::InvalidDefinition(_)) => {
            assert!(e.to_string().contains("operator procedure must be specified"))
        }
        other => panic!("Expected InvalidDefinition, got {:?}", other),
    }
    assert_eq!(
        cluster.coordinator().last_trail(),
        vec![DispatchState::Resolving, DispatchState::Aborted]
    );

    let unknown_function = cluster.execute(&session, &define_int4("<", &[("procedure", "no_such_function")]));
    assert!(matches!(unknown_function, Err(CatalogError::NotFound(_))));

    let bad_name = cluster.execute(&session, &define_int4("a<", &[("procedure", "int4lt")]));
    assert!(matches!(bad_name, Err(CatalogError::InvalidDefinition(_))));

    let setof = cluster.execute(&session, &statement("define < leftarg=\"setof int4\" rightarg=int4 procedure=int4lt"));
    assert!(matches!(setof, Err(CatalogError::InvalidDefinition(_))));

    for (_, snapshot) in cluster.snapshots() {
        assert!(snapshot.operators.is_empty());
    }
}

#[test]
fn test_unrecognized_attribute_is_a_warning() {
    let cluster = start_cluster(1);
    let result = cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt"), ("colour", "blue")]))
        .unwrap();
    assert_eq!(result.outcome.notices.len(), 1);
    assert_eq!(
        result.outcome.notices[0].to_string(),
        "WARNING:  operator attribute \"colour\" not recognized"
    );
    assert!(int4_operator(cluster.catalog(1).unwrap(), "<").is_some());
}

#[test]
fn test_duplicate_definition_is_rejected() {
    let cluster = start_cluster(1);
    let session = Session::new(ALICE);
    cluster.execute(&session, &define_int4("<", &[("procedure", "int4lt")])).unwrap();
    let again = cluster.execute(&session, &define_int4("<", &[("procedure", "int4lt")]));
    assert!(matches!(again, Err(CatalogError::DuplicateObject(_))));
    assert_consistent(&cluster);
}

#[test]
fn test_create_privilege_is_required_on_target_schema() {
    let cluster = cluster_builder(2)
        .setup(|_, catalog| catalog.create_namespace(Namespace::new(30000, "sales", ALICE, NamespaceAcl::new())))
        .build()
        .unwrap();

    let denied = cluster.execute(&Session::new(BOB), &statement("define sales.< leftarg=int4 rightarg=int4 procedure=int4lt"));
    match denied {
        Err(e @ CatalogError::PermissionDenied(_)) => assert!(e.to_string().contains("schema sales")),
        other => panic!("Expected PermissionDenied, got {:?}", other),
    }
    for (_, snapshot) in cluster.snapshots() {
        assert!(snapshot.operators.is_empty());
    }

    // The schema owner may create in it
    let result = cluster
        .execute(&Session::new(ALICE), &statement("define sales.< leftarg=int4 rightarg=int4 procedure=int4lt"))
        .unwrap();
    let row = cluster.catalog(2).unwrap().operator(result.outcome.object()).unwrap();
    assert_eq!(row.namespace(), 30000);
    assert_consistent(&cluster);
}

#[test]
fn test_shell_belongs_to_definer_until_completed() {
    let cluster = start_cluster(1);
    cluster
        .execute(&Session::new(ALICE), &define_int4("<", &[("procedure", "int4lt"), ("commutator", ">")]))
        .unwrap();

    // Only the shell's owner (or a superuser) may complete it
    let denied = cluster.execute(&Session::new(BOB), &define_int4(">", &[("procedure", "int4gt")]));
    assert!(matches!(denied, Err(CatalogError::PermissionDenied(_))));

    cluster
        .execute(&Session::new(CAROL), &define_int4(">", &[("procedure", "int4gt")]))
        .unwrap();
    let gt = int4_operator(cluster.catalog(1).unwrap(), ">").unwrap();
    assert!(gt.is_complete());
    assert_eq!(gt.owner(), CAROL);
    assert_consistent(&cluster);
}

#[test]
fn test_define_records_dependencies() {
    let cluster = start_cluster(1);
    let result = cluster
        .execute(
            &Session::new(ALICE),
            &define_int4("<", &[("procedure", "int4lt"), ("restrict", "scalarltsel"), ("join", "scalarltjoinsel")]),
        )
        .unwrap();
    let catalog = cluster.catalog(1).unwrap();
    let edges = catalog.edges_from(&ObjectAddress::operator(result.outcome.object()));
    let referenced: Vec<_> = edges.iter().map(|e| e.referenced).collect();
    assert!(referenced.contains(&ObjectAddress::role(ALICE)));
    assert!(referenced.iter().filter(|a| a.class == catalogd::catalog::ObjectClass::Function).count() == 3);
    assert!(edges.iter().all(|e| oid_is_valid(e.referenced.oid)));
    assert_consistent(&cluster);
}

#[test]
fn test_concurrent_partner_definitions_serialize() {
    let cluster = start_cluster(2);
    let session = Session::new(ALICE);
    let lt = define_int4("<", &[("procedure", "int4lt"), ("commutator", ">")]);
    let gt = define_int4(">", &[("procedure", "int4gt"), ("commutator", "<")]);

    std::thread::scope(|s| {
        let a = s.spawn(|| cluster.execute(&session, &lt));
        let b = s.spawn(|| cluster.execute(&session, &gt));
        a.join().unwrap().unwrap();
        b.join().unwrap().unwrap();
    });

    let catalog = cluster.coordinator().catalog();
    assert_eq!(catalog.operators().len(), 2);
    let lt = int4_operator(catalog, "<").unwrap();
    let gt = int4_operator(catalog, ">").unwrap();
    assert!(lt.is_complete() && gt.is_complete());
    assert_eq!(lt.commutator(), gt.oid());
    assert_eq!(gt.commutator(), lt.oid());
    assert_consistent(&cluster);
}

#[test]
fn test_partner_define_waits_out_a_slow_dispatch() {
    // The first define spends longer dispatching than the plain lock wait
    let config = test_config(1).with_lock_timeout(Duration::from_millis(200));
    let cluster = LocalCluster::builder(config)
        .setup(|_, catalog| create_roles(catalog))
        .wrap_transport(|_, inner| -> Box<dyn WorkerTransport> {
            Box::new(SlowTransport {
                inner,
                delay: Duration::from_millis(800),
            })
        })
        .build()
        .unwrap();
    let session = Session::new(ALICE);
    let lt = define_int4("<", &[("procedure", "int4lt"), ("commutator", ">")]);
    let gt = define_int4(">", &[("procedure", "int4gt"), ("commutator", "<")]);

    let (first, second) = std::thread::scope(|s| {
        let a = s.spawn(|| cluster.execute(&session, &lt));
        std::thread::sleep(Duration::from_millis(100));
        let b = s.spawn(|| cluster.execute(&session, &gt));
        (a.join().unwrap().unwrap(), b.join().unwrap().unwrap())
    });

    // The second define found the shell the first one reserved
    assert_eq!(Some(second.outcome.object()), first.outcome.assignment.commutator);
    for node in cluster.node_ids() {
        let catalog = cluster.catalog(node).unwrap();
        assert_eq!(catalog.operators_named(">").len(), 1);
        let lt = int4_operator(catalog, "<").unwrap();
        let gt = int4_operator(catalog, ">").unwrap();
        assert!(gt.is_complete(), "node {}", node);
        assert_eq!(lt.commutator(), gt.oid());
        assert_eq!(gt.commutator(), lt.oid());
    }
    assert_consistent(&cluster);
}
