// Type and function rows
//
// Both are stable objects for the operator commands: they are created by
// bootstrap or setup code and only ever referenced.

use serde::{Deserialize, Serialize};

use crate::common::types::Oid;

/// A data type usable as an operand or result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogType {
    oid: Oid,
    name: String,
    namespace: Oid,
    /// Pseudo-types such as `record` sets cannot be operator operands
    set_returning: bool,
}

impl CatalogType {
    pub fn new(oid: Oid, name: impl Into<String>, namespace: Oid) -> Self {
        Self {
            oid,
            name: name.into(),
            namespace,
            set_returning: false,
        }
    }

    pub fn set_returning(mut self) -> Self {
        self.set_returning = true;
        self
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Oid {
        self.namespace
    }

    pub fn is_set_returning(&self) -> bool {
        self.set_returning
    }
}

/// A function an operator can be implemented by, or use as an estimator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    oid: Oid,
    name: String,
    namespace: Oid,
    owner: Oid,
    arg_types: Vec<Oid>,
    result_type: Oid,
}

impl Function {
    pub fn new(
        oid: Oid,
        name: impl Into<String>,
        namespace: Oid,
        owner: Oid,
        arg_types: Vec<Oid>,
        result_type: Oid,
    ) -> Self {
        Self {
            oid,
            name: name.into(),
            namespace,
            owner,
            arg_types,
            result_type,
        }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Oid {
        self.namespace
    }

    pub fn owner(&self) -> Oid {
        self.owner
    }

    pub fn arg_types(&self) -> &[Oid] {
        &self.arg_types
    }

    pub fn result_type(&self) -> Oid {
        self.result_type
    }
}
