// Transaction concurrency module exports

pub mod lock;
pub mod transaction_manager;
pub mod transaction;

// Public exports
pub use lock::{LockManager, LockTag};
pub use transaction_manager::TransactionManager;
pub use transaction::{Transaction, TransactionError, TransactionState, UndoRecord};
