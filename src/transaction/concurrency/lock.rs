// Row lock manager
//
// Exclusive, transaction-scoped locks on catalog rows. A lock is taken
// before a row is read for update and released when the owning transaction
// commits or aborts. Operators are locked by key rather than by oid so that
// a define (which may not know the oid yet) and a remove of the same
// operator conflict.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};

use crate::catalog::{ObjectAddress, OperatorKey};
use crate::common::types::TxnId;
use super::transaction::{Result, TransactionError};

/// What a lock protects
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockTag {
    Operator(OperatorKey),
    Object(ObjectAddress),
}

impl fmt::Display for LockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockTag::Operator(key) => write!(
                f,
                "operator {} (namespace {}, {}, {})",
                key.name, key.namespace, key.left, key.right
            ),
            LockTag::Object(addr) => write!(f, "{} {}", addr.class, addr.oid),
        }
    }
}

/// Lock table shared by all transactions of one node
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<HashMap<LockTag, TxnId>>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `tag` for `txn`, waiting up to `timeout` for the holder to
    /// finish. Returns false if `txn` already held the lock.
    pub fn acquire(&self, txn: TxnId, tag: &LockTag, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut table = self.table.lock();
        loop {
            match table.get(tag) {
                None => {
                    table.insert(tag.clone(), txn);
                    return Ok(true);
                }
                Some(holder) if *holder == txn => return Ok(false),
                Some(holder) => {
                    let holder = *holder;
                    if self.released.wait_until(&mut table, deadline).timed_out() {
                        // One last look: the holder may have released right at the deadline
                        if table.get(tag).is_some_and(|h| *h != txn) {
                            return Err(TransactionError::LockTimeout {
                                tag: tag.to_string(),
                                holder,
                                waited: timeout,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Release every lock in `tags` that `txn` holds
    pub fn release_all(&self, txn: TxnId, tags: &[LockTag]) {
        let mut table = self.table.lock();
        for tag in tags {
            if table.get(tag) == Some(&txn) {
                table.remove(tag);
            }
        }
        drop(table);
        self.released.notify_all();
    }

    /// Current holder of a lock, if any
    pub fn holder(&self, tag: &LockTag) -> Option<TxnId> {
        self.table.lock().get(tag).copied()
    }

    pub fn held_count(&self) -> usize {
        self.table.lock().len()
    }
}
