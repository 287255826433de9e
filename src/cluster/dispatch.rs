//! Dispatch Coordinator
//!
//! Runs a command locally on the coordinator, then replays it on every
//! worker under one global transaction id with a two-phase protocol:
//!
//! ```text
//! Resolving -> LocallyApplied -> Dispatching -> Committed
//!     |              |               |
//!     +--------------+---------------+-----> Aborted
//! ```
//!
//! Workers are asked to prepare in parallel. Only when every worker has
//! prepared is everyone told to commit; any failure or timeout aborts the
//! workers and rolls back the local transaction, so the cluster never keeps a
//! partial mutation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::catalog::{Catalog, CatalogError, CatalogResult};
use crate::command::{CatalogStatement, CommandOutcome, OidGenerator, OperatorCommand, PipelineMode, Session};
use crate::common::types::{Gxid, NodeId};
use crate::transaction::TransactionManager;
use super::config::ClusterConfig;
use super::pending::{DispatchEnvelope, PendingCommand};
use super::transport::{DispatchError, WorkerTransport};

/// Where a command is in the dispatch protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Resolving,
    LocallyApplied,
    Dispatching,
    Committed,
    Aborted,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchState::Resolving => "resolving",
            DispatchState::LocallyApplied => "locally-applied",
            DispatchState::Dispatching => "dispatching",
            DispatchState::Committed => "committed",
            DispatchState::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Result of a command that committed cluster-wide
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub gxid: Gxid,
    pub outcome: CommandOutcome,
    /// Every state the command passed through
    pub trail: Vec<DispatchState>,
    /// Number of workers the command was replayed on
    pub dispatched_to: usize,
}

struct Trail {
    gxid: Gxid,
    states: Vec<DispatchState>,
}

impl Trail {
    fn new(gxid: Gxid) -> Self {
        Self {
            gxid,
            states: vec![DispatchState::Resolving],
        }
    }

    fn advance(&mut self, state: DispatchState) {
        debug!("gxid {}: {} -> {}", self.gxid, self.current(), state);
        self.states.push(state);
    }

    fn current(&self) -> DispatchState {
        self.states.last().copied().unwrap_or(DispatchState::Resolving)
    }
}

/// The coordinator node: owns the oid generator and the worker handles
pub struct DispatchCoordinator {
    transactions: TransactionManager,
    oids: Arc<dyn OidGenerator>,
    workers: Vec<Box<dyn WorkerTransport>>,
    dispatch_timeout: Duration,
    next_gxid: AtomicU64,
    last_trail: Mutex<Vec<DispatchState>>,
}

impl DispatchCoordinator {
    pub fn new(
        catalog: Arc<Catalog>,
        oids: Arc<dyn OidGenerator>,
        workers: Vec<Box<dyn WorkerTransport>>,
        config: &ClusterConfig,
    ) -> Self {
        Self {
            transactions: TransactionManager::new(catalog, config.coordinator_lock_timeout()),
            oids,
            workers,
            dispatch_timeout: config.dispatch_timeout,
            next_gxid: AtomicU64::new(1),
            last_trail: Mutex::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.transactions.catalog()
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn worker_ids(&self) -> Vec<NodeId> {
        self.workers.iter().map(|w| w.node_id()).collect()
    }

    /// States of the most recent command, whether it committed or not
    pub fn last_trail(&self) -> Vec<DispatchState> {
        self.last_trail.lock().clone()
    }

    /// Run `statement` on the whole cluster
    pub fn execute(&self, session: &Session, statement: &CatalogStatement) -> CatalogResult<DispatchOutcome> {
        let gxid = self.next_gxid.fetch_add(1, Ordering::SeqCst);
        let mut trail = Trail::new(gxid);
        let result = self.run(gxid, session, statement, &mut trail);
        if result.is_err() {
            trail.advance(DispatchState::Aborted);
        }
        *self.last_trail.lock() = trail.states.clone();
        result.map(|(outcome, dispatched_to)| DispatchOutcome {
            gxid,
            outcome,
            trail: trail.states,
            dispatched_to,
        })
    }

    fn run(
        &self,
        gxid: Gxid,
        session: &Session,
        statement: &CatalogStatement,
        trail: &mut Trail,
    ) -> CatalogResult<(CommandOutcome, usize)> {
        let mut txn = self.transactions.begin_transaction();
        let command = OperatorCommand::new(session, PipelineMode::Allocate(self.oids.as_ref()));
        let outcome = match command.execute(&mut txn, statement) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("gxid {}: {} failed locally: {}", gxid, statement.tag(), e);
                self.transactions.abort_transaction(txn)?;
                return Err(e);
            }
        };
        trail.advance(DispatchState::LocallyApplied);

        if !outcome.changed() || self.workers.is_empty() {
            self.transactions.commit_transaction(txn)?;
            trail.advance(DispatchState::Committed);
            info!("gxid {}: {} committed locally", gxid, statement.tag());
            return Ok((outcome, 0));
        }

        let envelope = DispatchEnvelope {
            gxid,
            session: session.clone(),
            command: PendingCommand::from_outcome(statement, &outcome)?,
        };
        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(e) => {
                self.transactions.abort_transaction(txn)?;
                return Err(e.into());
            }
        };

        trail.advance(DispatchState::Dispatching);
        if let Err(e) = self.prepare_all(gxid, &frame, &outcome) {
            self.abort_all(gxid);
            self.transactions.abort_transaction(txn)?;
            warn!("gxid {}: {} aborted cluster-wide: {}", gxid, statement.tag(), e);
            return Err(e);
        }

        self.commit_all(gxid);
        self.transactions.commit_transaction(txn)?;
        trail.advance(DispatchState::Committed);
        info!(
            "gxid {}: {} committed on coordinator and {} worker(s)",
            gxid,
            statement.tag(),
            self.workers.len()
        );
        Ok((outcome, self.workers.len()))
    }

    /// Call every worker concurrently, one scoped thread each
    fn fan_out<T, F>(&self, call: F) -> CatalogResult<Vec<(NodeId, T)>>
    where
        T: Send,
        F: Fn(&dyn WorkerTransport) -> T + Sync,
    {
        let call = &call;
        crossbeam::scope(|s| {
            let handles: Vec<_> = self
                .workers
                .iter()
                .map(|worker| s.spawn(move |_| (worker.node_id(), call(worker.as_ref()))))
                .collect();
            handles.into_iter().map(|h| h.join()).collect::<std::thread::Result<Vec<_>>>()
        })
        .map_err(|_| CatalogError::Internal("dispatch scope panicked".to_string()))?
        .map_err(|_| CatalogError::Internal("dispatch thread panicked".to_string()))
    }

    /// Phase one. Succeeds only if every worker prepared with the
    /// coordinator's identifiers.
    fn prepare_all(&self, gxid: Gxid, frame: &[u8], outcome: &CommandOutcome) -> CatalogResult<()> {
        let timeout = self.dispatch_timeout;
        let replies = self.fan_out(|worker| worker.prepare(gxid, frame, timeout))?;

        let mut failure: Option<DispatchError> = None;
        for (node, reply) in replies {
            match reply {
                Ok(assignment) if assignment == outcome.assignment => {
                    debug!("gxid {}: node {} prepared", gxid, node);
                }
                Ok(assignment) => {
                    error!(
                        "gxid {}: node {} prepared with {:?}, coordinator used {:?}",
                        gxid, node, assignment, outcome.assignment
                    );
                    return Err(CatalogError::ProtocolViolation(format!(
                        "node {} used different identifiers than the coordinator",
                        node
                    )));
                }
                Err(e) => {
                    warn!("gxid {}: node {} failed to prepare: {}", gxid, node, e);
                    // A violation outranks an ordinary failure
                    if failure.as_ref().map_or(true, |f| !f.is_violation() && e.is_violation()) {
                        failure = Some(e);
                    }
                }
            }
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Phase two. The decision is already made, so failures are only logged.
    fn commit_all(&self, gxid: Gxid) {
        let timeout = self.dispatch_timeout;
        match self.fan_out(|worker| worker.commit_prepared(gxid, timeout)) {
            Ok(replies) => {
                for (node, reply) in replies {
                    if let Err(e) = reply {
                        error!("gxid {}: node {} failed to commit: {}", gxid, node, e);
                    }
                }
            }
            Err(e) => error!("gxid {}: commit fan-out failed: {}", gxid, e),
        }
    }

    fn abort_all(&self, gxid: Gxid) {
        let timeout = self.dispatch_timeout;
        match self.fan_out(|worker| worker.abort_prepared(gxid, timeout)) {
            Ok(replies) => {
                for (node, reply) in replies {
                    if let Err(e) = reply {
                        warn!("gxid {}: node {} failed to abort: {}", gxid, node, e);
                    }
                }
            }
            Err(e) => error!("gxid {}: abort fan-out failed: {}", gxid, e),
        }
    }
}
