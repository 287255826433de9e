// In-process Cluster
//
// A coordinator plus N worker threads, each worker with its own catalog,
// connected by channels. Used by the binaries and the integration tests.

use std::sync::Arc;
use std::thread::JoinHandle;
use log::warn;

use crate::catalog::{Catalog, CatalogError, CatalogResult, CatalogSnapshot};
use crate::command::{CatalogStatement, OidGenerator, SequentialOidGenerator, Session};
use crate::common::types::{NodeId, COORDINATOR_NODE_ID};
use crate::transaction::LockManager;
use super::config::ClusterConfig;
use super::dispatch::{DispatchCoordinator, DispatchOutcome};
use super::node::ClusterNode;
use super::transport::{spawn_worker, ChannelTransport, WorkerTransport};

type SetupFn = Box<dyn Fn(NodeId, &Catalog) -> CatalogResult<()>>;
type WrapFn = Box<dyn Fn(NodeId, Box<dyn WorkerTransport>) -> Box<dyn WorkerTransport>>;

/// Builder for [`LocalCluster`]
pub struct LocalClusterBuilder {
    config: ClusterConfig,
    setups: Vec<SetupFn>,
    wrap: Option<WrapFn>,
    oids: Option<Arc<dyn OidGenerator>>,
}

impl LocalClusterBuilder {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            setups: Vec::new(),
            wrap: None,
            oids: None,
        }
    }

    /// Run `setup` against every node's catalog before the cluster starts.
    /// Setups receive the node id so a test can make one node diverge.
    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(NodeId, &Catalog) -> CatalogResult<()> + 'static,
    {
        self.setups.push(Box::new(setup));
        self
    }

    /// Wrap each worker's transport, e.g. to inject failures
    pub fn wrap_transport<F>(mut self, wrap: F) -> Self
    where
        F: Fn(NodeId, Box<dyn WorkerTransport>) -> Box<dyn WorkerTransport> + 'static,
    {
        self.wrap = Some(Box::new(wrap));
        self
    }

    pub fn oid_generator(mut self, oids: Arc<dyn OidGenerator>) -> Self {
        self.oids = Some(oids);
        self
    }

    fn catalog_for(&self, node: NodeId) -> CatalogResult<Arc<Catalog>> {
        let catalog = Catalog::new();
        for setup in &self.setups {
            setup(node, &catalog)?;
        }
        Ok(Arc::new(catalog))
    }

    pub fn build(self) -> CatalogResult<LocalCluster> {
        let mut catalogs = vec![self.catalog_for(COORDINATOR_NODE_ID)?];
        let mut controls = Vec::with_capacity(self.config.worker_count);
        let mut worker_locks = Vec::with_capacity(self.config.worker_count);
        let mut handles = Vec::with_capacity(self.config.worker_count);
        let mut workers: Vec<Box<dyn WorkerTransport>> = Vec::with_capacity(self.config.worker_count);

        for i in 0..self.config.worker_count {
            let id = (i + 1) as NodeId;
            let catalog = self.catalog_for(id)?;
            catalogs.push(catalog.clone());
            let node = ClusterNode::new(id, catalog, self.config.lock_timeout);
            worker_locks.push(node.locks().clone());
            let (transport, handle) = spawn_worker(node)
                .map_err(|e| CatalogError::Internal(format!("failed to start worker {}: {}", id, e)))?;
            controls.push(transport.clone());
            handles.push(handle);
            let transport: Box<dyn WorkerTransport> = Box::new(transport);
            workers.push(match &self.wrap {
                Some(wrap) => wrap(id, transport),
                None => transport,
            });
        }

        let oids = self
            .oids
            .unwrap_or_else(|| Arc::new(SequentialOidGenerator::new(self.config.first_normal_oid)));
        let coordinator = DispatchCoordinator::new(catalogs[0].clone(), oids, workers, &self.config);
        Ok(LocalCluster {
            config: self.config,
            coordinator,
            catalogs,
            worker_locks,
            controls,
            handles,
        })
    }
}

/// A running in-process cluster. Dropping it stops the worker threads.
pub struct LocalCluster {
    config: ClusterConfig,
    coordinator: DispatchCoordinator,
    /// Indexed by node id; the coordinator is node 0
    catalogs: Vec<Arc<Catalog>>,
    /// Indexed by node id minus one
    worker_locks: Vec<Arc<LockManager>>,
    controls: Vec<ChannelTransport>,
    handles: Vec<JoinHandle<()>>,
}

impl LocalCluster {
    pub fn builder(config: ClusterConfig) -> LocalClusterBuilder {
        LocalClusterBuilder::new(config)
    }

    /// A cluster with default configuration and no extra setup
    pub fn start(config: ClusterConfig) -> CatalogResult<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &DispatchCoordinator {
        &self.coordinator
    }

    pub fn execute(&self, session: &Session, statement: &CatalogStatement) -> CatalogResult<DispatchOutcome> {
        self.coordinator.execute(session, statement)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.catalogs.len()).map(|i| i as NodeId).collect()
    }

    pub fn catalog(&self, node: NodeId) -> Option<&Arc<Catalog>> {
        self.catalogs.get(node as usize)
    }

    /// Lock table of a node; on a worker it also covers prepared commands
    pub fn locks(&self, node: NodeId) -> Option<&Arc<LockManager>> {
        match node {
            COORDINATOR_NODE_ID => Some(self.coordinator.transactions().locks()),
            _ => self.worker_locks.get(node as usize - 1),
        }
    }

    pub fn snapshots(&self) -> Vec<(NodeId, CatalogSnapshot)> {
        self.catalogs
            .iter()
            .enumerate()
            .map(|(i, c)| (i as NodeId, c.snapshot()))
            .collect()
    }

    /// True if every worker holds exactly the coordinator's operators and edges
    pub fn is_consistent(&self) -> bool {
        let coordinator = self.catalogs[0].snapshot();
        self.catalogs[1..].iter().all(|c| c.snapshot() == coordinator)
    }
}

impl Drop for LocalCluster {
    fn drop(&mut self) {
        for control in &self.controls {
            if let Err(e) = control.shutdown(self.config.dispatch_timeout) {
                warn!("failed to stop worker {}: {}", control.node_id(), e);
            }
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
