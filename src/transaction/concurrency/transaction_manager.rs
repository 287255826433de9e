use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use parking_lot::Mutex;

use crate::catalog::Catalog;
use crate::common::types::TxnId;
use super::lock::LockManager;
use super::transaction::{Result, Transaction, TransactionError};

/// Transaction manager - responsible for creating and tracking the
/// transactions of one node
pub struct TransactionManager {
    /// Next transaction ID to assign
    next_txn_id: AtomicU32,

    /// Catalog the transactions write to
    catalog: Arc<Catalog>,

    /// Row locks shared by every transaction of this node
    locks: Arc<LockManager>,

    /// How long a transaction waits for a row lock
    lock_timeout: Duration,

    /// IDs of transactions that have neither committed nor aborted
    active_transactions: Arc<Mutex<HashSet<TxnId>>>,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new(catalog: Arc<Catalog>, lock_timeout: Duration) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1), // Start from 1
            catalog,
            locks: Arc::new(LockManager::new()),
            lock_timeout,
            active_transactions: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Begin a new transaction
    pub fn begin_transaction(&self) -> Transaction {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        self.active_transactions.lock().insert(txn_id);
        Transaction::new(
            txn_id,
            self.catalog.clone(),
            self.locks.clone(),
            self.lock_timeout,
            self.active_transactions.clone(),
        )
    }

    /// Commit a transaction
    pub fn commit_transaction(&self, mut txn: Transaction) -> Result<()> {
        if !self.transaction_exists(txn.id()) {
            return Err(TransactionError::InternalError(format!("Transaction {} not found", txn.id())));
        }
        txn.commit()
    }

    /// Abort a transaction
    pub fn abort_transaction(&self, mut txn: Transaction) -> Result<()> {
        if !self.transaction_exists(txn.id()) {
            return Err(TransactionError::InternalError(format!("Transaction {} not found", txn.id())));
        }
        txn.abort()
    }

    /// Check if a transaction is still active
    pub fn transaction_exists(&self, txn_id: TxnId) -> bool {
        self.active_transactions.lock().contains(&txn_id)
    }

    /// Get all active transaction IDs
    pub fn get_active_transaction_ids(&self) -> Vec<TxnId> {
        let mut ids: Vec<TxnId> = self.active_transactions.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }
}
