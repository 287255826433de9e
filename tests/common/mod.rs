#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use catalogd::catalog::bootstrap::{INT4_OID, PUBLIC_NAMESPACE};
use catalogd::catalog::{Catalog, CatalogResult, OperatorKey, OperatorRow, Role};
use catalogd::cluster::{ClusterConfig, DispatchError, LocalCluster, LocalClusterBuilder, WorkerTransport};
use catalogd::command::{
    parse_script_line, CatalogStatement, DefArg, DefElem, DefineOperatorStmt, OidAssignment, QualifiedName, ScriptLine,
};
use catalogd::common::types::{Gxid, NodeId, Oid};

pub const ALICE: Oid = 20000;
pub const BOB: Oid = 20001;
pub const CAROL: Oid = 20002;

// Roles every test node knows; CAROL is a superuser
pub fn create_roles(catalog: &Catalog) -> CatalogResult<()> {
    catalog.create_role(Role::new(ALICE, "alice", false))?;
    catalog.create_role(Role::new(BOB, "bob", false))?;
    catalog.create_role(Role::new(CAROL, "carol", true))?;
    Ok(())
}

pub fn test_config(workers: usize) -> ClusterConfig {
    ClusterConfig::default()
        .with_workers(workers)
        .with_dispatch_timeout(Duration::from_secs(2))
}

// A cluster builder with the test roles on every node
pub fn cluster_builder(workers: usize) -> LocalClusterBuilder {
    LocalCluster::builder(test_config(workers)).setup(|_, catalog| create_roles(catalog))
}

pub fn start_cluster(workers: usize) -> LocalCluster {
    cluster_builder(workers).build().unwrap()
}

// Parse one command line into a statement
pub fn statement(line: &str) -> CatalogStatement {
    match parse_script_line(line).unwrap() {
        ScriptLine::Statement(statement) => statement,
        other => panic!("not a catalog statement: {:?}", other),
    }
}

// DEFINE of an int4 x int4 operator with the given extra attributes
pub fn define_int4(name: &str, attrs: &[(&str, &str)]) -> CatalogStatement {
    let mut definition = vec![
        DefElem::new("leftarg", DefArg::Text("int4".into())),
        DefElem::new("rightarg", DefArg::Text("int4".into())),
    ];
    definition.extend(attrs.iter().map(|(k, v)| DefElem::new(*k, DefArg::Text(v.to_string()))));
    CatalogStatement::DefineOperator(DefineOperatorStmt {
        name: QualifiedName::new(name),
        definition,
    })
}

pub fn int4_key(name: &str) -> OperatorKey {
    OperatorKey::new(name, PUBLIC_NAMESPACE, INT4_OID, INT4_OID)
}

pub fn int4_operator(catalog: &Catalog, name: &str) -> Option<OperatorRow> {
    catalog.operator_by_key(&int4_key(name))
}

// Asserts every node of the cluster holds the coordinator's rows and edges
pub fn assert_consistent(cluster: &LocalCluster) {
    let snapshots = cluster.snapshots();
    let (_, coordinator) = &snapshots[0];
    for (node, snapshot) in &snapshots[1..] {
        assert_eq!(snapshot, coordinator, "node {} diverged from the coordinator", node);
    }
}

/// Transport wrapper that makes one phase fail
pub struct FailingTransport {
    pub inner: Box<dyn WorkerTransport>,
    pub violation: bool,
    pub aborts: Arc<AtomicUsize>,
}

impl FailingTransport {
    pub fn new(inner: Box<dyn WorkerTransport>, aborts: Arc<AtomicUsize>) -> Self {
        Self {
            inner,
            violation: false,
            aborts,
        }
    }
}

impl WorkerTransport for FailingTransport {
    fn node_id(&self) -> NodeId {
        self.inner.node_id()
    }

    fn prepare(&self, _gxid: Gxid, _frame: &[u8], _timeout: Duration) -> Result<OidAssignment, DispatchError> {
        Err(DispatchError::Rejected {
            node: self.node_id(),
            message: "injected failure".to_string(),
            violation: self.violation,
        })
    }

    fn commit_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<(), DispatchError> {
        self.inner.commit_prepared(gxid, timeout)
    }

    fn abort_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<(), DispatchError> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort_prepared(gxid, timeout)
    }
}

/// Transport wrapper that delays prepares; a delay past the deadline is a timeout
pub struct SlowTransport {
    pub inner: Box<dyn WorkerTransport>,
    pub delay: Duration,
}

impl WorkerTransport for SlowTransport {
    fn node_id(&self) -> NodeId {
        self.inner.node_id()
    }

    fn prepare(&self, gxid: Gxid, frame: &[u8], timeout: Duration) -> Result<OidAssignment, DispatchError> {
        if self.delay >= timeout {
            thread::sleep(timeout);
            return Err(DispatchError::Timeout {
                node: self.node_id(),
                timeout,
            });
        }
        thread::sleep(self.delay);
        self.inner.prepare(gxid, frame, timeout - self.delay)
    }

    fn commit_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<(), DispatchError> {
        self.inner.commit_prepared(gxid, timeout)
    }

    fn abort_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<(), DispatchError> {
        self.inner.abort_prepared(gxid, timeout)
    }
}

/// Transport the test keeps a handle on while the coordinator uses it
pub struct SharedTransport(pub Arc<dyn WorkerTransport>);

impl WorkerTransport for SharedTransport {
    fn node_id(&self) -> NodeId {
        self.0.node_id()
    }

    fn prepare(&self, gxid: Gxid, frame: &[u8], timeout: Duration) -> Result<OidAssignment, DispatchError> {
        self.0.prepare(gxid, frame, timeout)
    }

    fn commit_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<(), DispatchError> {
        self.0.commit_prepared(gxid, timeout)
    }

    fn abort_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<(), DispatchError> {
        self.0.abort_prepared(gxid, timeout)
    }
}

// Returns once the worker behind `transport` has handled everything queued
// before this call. Aborting an unknown gxid changes nothing.
pub fn drain_worker(transport: &dyn WorkerTransport) {
    transport.abort_prepared(Gxid::MAX, Duration::from_secs(10)).unwrap();
}
