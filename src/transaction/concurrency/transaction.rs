// Catalog Transaction implementation
// Represents one in-flight catalog command on one node

use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use std::collections::HashSet;
use thiserror::Error;
use log::{debug, warn};

use crate::catalog::{Catalog, CatalogRow, DependencyEdge, ObjectAddress};
use crate::common::types::TxnId;
use super::lock::{LockManager, LockTag};

/// Transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is already committed or aborted")]
    InvalidState(TxnId),

    #[error("Timed out after {waited:?} waiting for lock on {tag} held by transaction {holder}")]
    LockTimeout {
        tag: String,
        holder: TxnId,
        waited: Duration,
    },

    #[error("Internal transaction error: {0}")]
    InternalError(String),
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Before-image of one change, applied in reverse order on abort
#[derive(Debug, Clone)]
pub enum UndoRecord {
    /// A row was written or removed; `before` is what was there
    Row {
        address: ObjectAddress,
        before: Option<CatalogRow>,
    },
    EdgeInserted(DependencyEdge),
    EdgeRemoved(DependencyEdge),
}

/// Transaction - all catalog writes of one command on one node.
///
/// Dropping an active transaction rolls it back.
pub struct Transaction {
    id: TxnId,
    state: TransactionState,
    catalog: Arc<Catalog>,
    locks: Arc<LockManager>,
    lock_timeout: Duration,
    undo_log: Vec<UndoRecord>,
    held_locks: Vec<LockTag>,
    /// Shared with the TransactionManager's active set
    active: Arc<Mutex<HashSet<TxnId>>>,
}

impl Transaction {
    pub(crate) fn new(
        id: TxnId,
        catalog: Arc<Catalog>,
        locks: Arc<LockManager>,
        lock_timeout: Duration,
        active: Arc<Mutex<HashSet<TxnId>>>,
    ) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            catalog,
            locks,
            lock_timeout,
            undo_log: Vec::new(),
            held_locks: Vec::new(),
            active,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Number of changes made so far
    pub fn change_count(&self) -> usize {
        self.undo_log.len()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(TransactionError::InvalidState(self.id));
        }
        Ok(())
    }

    /// Lock a row for update until this transaction ends
    pub fn lock(&mut self, tag: LockTag) -> Result<()> {
        self.ensure_active()?;
        if self.locks.acquire(self.id, &tag, self.lock_timeout)? {
            self.held_locks.push(tag);
        }
        Ok(())
    }

    /// Lock several rows, in canonical order so two transactions locking
    /// overlapping sets cannot deadlock
    pub fn lock_all(&mut self, mut tags: Vec<LockTag>) -> Result<()> {
        tags.sort();
        tags.dedup();
        for tag in tags {
            self.lock(tag)?;
        }
        Ok(())
    }

    /// Insert or overwrite a row
    pub fn put_row(&mut self, row: CatalogRow) -> Result<()> {
        self.ensure_active()?;
        let address = row.address();
        let before = self.catalog.write_row(row);
        self.undo_log.push(UndoRecord::Row { address, before });
        Ok(())
    }

    /// Remove a row, returning it if it existed
    pub fn remove_row(&mut self, address: &ObjectAddress) -> Result<Option<CatalogRow>> {
        self.ensure_active()?;
        let before = self.catalog.delete_row(address);
        if before.is_some() {
            self.undo_log.push(UndoRecord::Row {
                address: *address,
                before: before.clone(),
            });
        }
        Ok(before)
    }

    pub fn insert_edge(&mut self, edge: DependencyEdge) -> Result<()> {
        self.ensure_active()?;
        if self.catalog.add_edge(edge) {
            self.undo_log.push(UndoRecord::EdgeInserted(edge));
        }
        Ok(())
    }

    pub fn remove_edge(&mut self, edge: &DependencyEdge) -> Result<()> {
        self.ensure_active()?;
        if self.catalog.drop_edge(edge) {
            self.undo_log.push(UndoRecord::EdgeRemoved(*edge));
        }
        Ok(())
    }

    /// Commit the transaction
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;
        debug!("txn {} committing {} change(s)", self.id, self.undo_log.len());
        self.undo_log.clear();
        self.finish(TransactionState::Committed);
        Ok(())
    }

    /// Abort the transaction, undoing every change
    pub fn abort(&mut self) -> Result<()> {
        self.ensure_active()?;
        debug!("txn {} rolling back {} change(s)", self.id, self.undo_log.len());
        while let Some(record) = self.undo_log.pop() {
            self.catalog.apply_undo(record);
        }
        self.finish(TransactionState::Aborted);
        Ok(())
    }

    fn finish(&mut self, state: TransactionState) {
        self.state = state;
        let held = std::mem::take(&mut self.held_locks);
        self.locks.release_all(self.id, &held);
        self.active.lock().remove(&self.id);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            warn!("txn {} dropped while active; rolling back", self.id);
            let _ = self.abort();
        }
    }
}
