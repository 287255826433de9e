// Catalog command engine for operators, replicated across a cluster

pub mod catalog;
pub mod cluster;
pub mod command;
pub mod common;
pub mod transaction;

// Re-export key items for convenient access
pub use catalog::{Catalog, CatalogError, CatalogResult};
pub use cluster::{ClusterConfig, DispatchCoordinator, LocalCluster};
pub use command::{CatalogStatement, CommandOutcome, OperatorCommand, Session};
pub use transaction::TransactionManager;
