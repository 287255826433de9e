// Catalog Transaction Module
//
// Node-local transactions over the catalog: undo logging for rollback and
// transaction-scoped row locks.

pub mod concurrency;

// Public exports
pub use concurrency::lock::{LockManager, LockTag};
pub use concurrency::transaction::{Transaction, TransactionError, TransactionState, UndoRecord};
pub use concurrency::transaction_manager::TransactionManager;
