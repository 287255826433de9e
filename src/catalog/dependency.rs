// Dependency Data Model
//
// Edges between catalog objects. The DependencyTracker in the command layer
// maintains them; the catalog only stores them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::types::Oid;

/// The catalog class an object belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectClass {
    Namespace,
    Role,
    Type,
    Function,
    Operator,
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectClass::Namespace => "schema",
            ObjectClass::Role => "role",
            ObjectClass::Type => "type",
            ObjectClass::Function => "function",
            ObjectClass::Operator => "operator",
        };
        write!(f, "{}", s)
    }
}

/// Address of one catalog object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectAddress {
    pub class: ObjectClass,
    pub oid: Oid,
}

impl ObjectAddress {
    pub fn new(class: ObjectClass, oid: Oid) -> Self {
        Self { class, oid }
    }

    pub fn operator(oid: Oid) -> Self {
        Self::new(ObjectClass::Operator, oid)
    }

    pub fn namespace(oid: Oid) -> Self {
        Self::new(ObjectClass::Namespace, oid)
    }

    pub fn role(oid: Oid) -> Self {
        Self::new(ObjectClass::Role, oid)
    }

    pub fn type_(oid: Oid) -> Self {
        Self::new(ObjectClass::Type, oid)
    }

    pub fn function(oid: Oid) -> Self {
        Self::new(ObjectClass::Function, oid)
    }
}

/// How the dependent relates to the referenced object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    /// The referenced object owns the dependent: dropping the referenced
    /// object requires CASCADE, which drops the dependent too
    Owns,
    /// Plain reference; removed together with either end
    Normal,
    /// The dependent goes away silently whenever the referenced object does
    Auto,
}

/// One dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub dependent: ObjectAddress,
    pub referenced: ObjectAddress,
    pub kind: DependencyKind,
}

impl DependencyEdge {
    pub fn new(dependent: ObjectAddress, referenced: ObjectAddress, kind: DependencyKind) -> Self {
        Self { dependent, referenced, kind }
    }

    /// True if either end of the edge is the given object
    pub fn mentions(&self, addr: &ObjectAddress) -> bool {
        self.dependent == *addr || self.referenced == *addr
    }
}
