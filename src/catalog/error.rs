use thiserror::Error;

use crate::common::types::NodeId;
use crate::transaction::TransactionError;

/// Coarse classification of catalog command failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input from the caller
    UserError,
    /// The session's role lacks a privilege
    PermissionError,
    /// The command would leave the catalog inconsistent
    ConsistencyError,
    /// The named object does not exist
    NotFoundError,
    /// Coordinator and worker disagree; never retried
    ProtocolViolation,
    /// A worker failed or did not answer during dispatch
    DispatchFailure,
    /// Broken internal invariant
    Internal,
}

/// Errors raised by catalog commands
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{0} already exists")]
    DuplicateObject(String),

    #[error("cannot drop {object} because other objects depend on it: {}", dependents.join(", "))]
    DependentObjectsExist {
        object: String,
        dependents: Vec<String>,
    },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("dispatch to node {node} failed: {reason}")]
    DispatchFailure { node: NodeId, reason: String },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("internal catalog error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Map the error onto its class
    pub fn class(&self) -> ErrorClass {
        match self {
            CatalogError::PermissionDenied(_) => ErrorClass::PermissionError,
            CatalogError::InvalidDefinition(_) | CatalogError::DuplicateObject(_) => ErrorClass::UserError,
            CatalogError::NotFound(_) => ErrorClass::NotFoundError,
            CatalogError::DependentObjectsExist { .. } => ErrorClass::ConsistencyError,
            CatalogError::ProtocolViolation(_) => ErrorClass::ProtocolViolation,
            CatalogError::DispatchFailure { .. } => ErrorClass::DispatchFailure,
            CatalogError::Transaction(TransactionError::LockTimeout { .. }) => ErrorClass::ConsistencyError,
            CatalogError::Codec(_) | CatalogError::Transaction(_) | CatalogError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Fatal errors abort the whole command and must never be retried
    pub fn is_fatal(&self) -> bool {
        matches!(self.class(), ErrorClass::ProtocolViolation | ErrorClass::Internal)
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
