use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, info};

use crate::catalog::{Catalog, CatalogError, CatalogResult, CatalogSnapshot};
use crate::command::{CommandOutcome, CommandStatus, OperatorCommand, PipelineMode};
use crate::common::types::{Gxid, NodeId};
use crate::transaction::{LockManager, Transaction, TransactionManager};
use super::pending::{DispatchEnvelope, PendingCommand};

/// A worker node: replays dispatched commands against its own catalog and
/// holds each one prepared until the coordinator decides its fate.
pub struct ClusterNode {
    id: NodeId,
    transactions: TransactionManager,
    prepared: HashMap<Gxid, Transaction>,
}

impl ClusterNode {
    pub fn new(id: NodeId, catalog: Arc<Catalog>, lock_timeout: Duration) -> Self {
        Self {
            id,
            transactions: TransactionManager::new(catalog, lock_timeout),
            prepared: HashMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.transactions.catalog()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.catalog().snapshot()
    }

    /// Locks of this node's transactions, prepared ones included
    pub fn locks(&self) -> &Arc<LockManager> {
        self.transactions.locks()
    }

    pub fn prepared_count(&self) -> usize {
        self.prepared.len()
    }

    fn violation(&self, message: String) -> CatalogError {
        error!("node {}: protocol violation: {}", self.id, message);
        CatalogError::ProtocolViolation(message)
    }

    /// Decode and apply one dispatched command. On success its transaction
    /// stays open, holding its locks, until commit or abort.
    pub fn prepare(&mut self, gxid: Gxid, frame: &[u8]) -> CatalogResult<CommandOutcome> {
        if self.prepared.contains_key(&gxid) {
            return Err(self.violation(format!("transaction {} is already prepared", gxid)));
        }
        let envelope = DispatchEnvelope::decode(frame)?;
        if envelope.gxid != gxid {
            return Err(self.violation(format!("frame for transaction {} delivered as {}", envelope.gxid, gxid)));
        }

        let assignment = envelope.command.assignment();
        let statement = envelope.command.statement();
        let command = OperatorCommand::new(&envelope.session, PipelineMode::Apply(&assignment));

        let mut txn = self.transactions.begin_transaction();
        let result = command
            .execute(&mut txn, &statement)
            .and_then(|outcome| self.check_agreement(&envelope.command, outcome));
        match result {
            Ok(outcome) => {
                debug!("node {}: prepared {} as txn {}", self.id, gxid, txn.id());
                self.prepared.insert(gxid, txn);
                Ok(outcome)
            }
            Err(e) => {
                self.transactions.abort_transaction(txn)?;
                Err(e)
            }
        }
    }

    /// A replayed command must do on this node exactly what it did on the
    /// coordinator
    fn check_agreement(&self, command: &PendingCommand, outcome: CommandOutcome) -> CatalogResult<CommandOutcome> {
        let agrees = match command {
            PendingCommand::DefineOperator { assignment, .. } => {
                outcome.status == CommandStatus::Defined && outcome.assignment == *assignment
            }
            PendingCommand::AlterOperatorOwner { new_owner, .. } => {
                outcome.status == CommandStatus::OwnerChanged && outcome.owner == Some(*new_owner)
            }
            PendingCommand::RemoveOperator { .. } => outcome.status == CommandStatus::Removed,
        };
        if !agrees {
            return Err(self.violation(format!(
                "replayed {} ended as {:?} with {:?}",
                command.statement().tag(),
                outcome.status,
                outcome.assignment
            )));
        }
        Ok(outcome)
    }

    pub fn commit_prepared(&mut self, gxid: Gxid) -> CatalogResult<()> {
        let Some(txn) = self.prepared.remove(&gxid) else {
            return Err(self.violation(format!("no prepared transaction {}", gxid)));
        };
        self.transactions.commit_transaction(txn)?;
        info!("node {}: committed {}", self.id, gxid);
        Ok(())
    }

    /// Roll back a prepared command. Returns false if nothing was prepared
    /// under `gxid`, which happens when the prepare itself failed or never
    /// arrived.
    pub fn abort_prepared(&mut self, gxid: Gxid) -> CatalogResult<bool> {
        match self.prepared.remove(&gxid) {
            Some(txn) => {
                self.transactions.abort_transaction(txn)?;
                info!("node {}: aborted {}", self.id, gxid);
                Ok(true)
            }
            None => {
                debug!("node {}: nothing prepared for {}", self.id, gxid);
                Ok(false)
            }
        }
    }
}
