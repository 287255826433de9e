//! Catalog Management Module
//!
//! This module holds the catalog rows of one node (namespaces, roles, types,
//! functions, operators) and the dependency edges between them.

pub mod bootstrap;
pub mod catalog;
pub mod dependency;
pub mod error;
pub mod function;
pub mod namespace;
pub mod operator;
pub mod role;

// Re-export key types
pub use self::catalog::{Catalog, CatalogRow, CatalogSnapshot};
pub use self::dependency::{DependencyEdge, DependencyKind, ObjectAddress, ObjectClass};
pub use self::error::{CatalogError, CatalogResult, ErrorClass};
pub use self::function::{CatalogType, Function};
pub use self::namespace::{Namespace, NamespaceAcl};
pub use self::operator::{OperatorDetails, OperatorKey, OperatorKind, OperatorRow};
pub use self::role::Role;
