//! Operator rows
//!
//! An operator row is either complete or a *shell*: a placeholder that
//! reserves an oid and a key for an operator that has been referenced (as a
//! commutator or negator) but not yet defined. A later define of the same
//! key completes the shell in place, keeping its oid.

use serde::{Deserialize, Serialize};

use crate::common::types::{oid_is_valid, Oid, INVALID_OID};

/// Unique lookup key of an operator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperatorKey {
    pub name: String,
    pub namespace: Oid,
    pub left: Oid,
    pub right: Oid,
}

impl OperatorKey {
    pub fn new(name: impl Into<String>, namespace: Oid, left: Oid, right: Oid) -> Self {
        Self {
            name: name.into(),
            namespace,
            left,
            right,
        }
    }

    /// Key of the operator that would be this operator's commutator
    pub fn commuted(&self, name: impl Into<String>, namespace: Oid) -> Self {
        Self::new(name, namespace, self.right, self.left)
    }

    pub fn kind(&self) -> OperatorKind {
        OperatorKind::from_operands(self.left, self.right)
    }
}

/// Operand shape of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorKind {
    Binary,
    /// No left operand
    Prefix,
    /// No right operand
    Postfix,
}

impl OperatorKind {
    pub fn from_operands(left: Oid, right: Oid) -> Self {
        match (oid_is_valid(left), oid_is_valid(right)) {
            (true, true) => OperatorKind::Binary,
            (false, _) => OperatorKind::Prefix,
            (true, false) => OperatorKind::Postfix,
        }
    }
}

/// The definition-dependent part of an operator, filled in on completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDetails {
    pub result: Oid,
    pub procedure: Oid,
    pub restrict: Oid,
    pub join: Oid,
    pub can_merge: bool,
    pub can_hash: bool,
}

/// One row of the operator catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorRow {
    oid: Oid,
    key: OperatorKey,
    owner: Oid,
    kind: OperatorKind,
    result: Oid,
    procedure: Oid,
    restrict: Oid,
    join: Oid,
    commutator: Oid,
    negator: Oid,
    can_merge: bool,
    can_hash: bool,
    complete: bool,
}

impl OperatorRow {
    /// Build a placeholder row reserving `oid` for `key`
    pub fn shell(oid: Oid, key: OperatorKey, owner: Oid) -> Self {
        let kind = key.kind();
        Self {
            oid,
            key,
            owner,
            kind,
            result: INVALID_OID,
            procedure: INVALID_OID,
            restrict: INVALID_OID,
            join: INVALID_OID,
            commutator: INVALID_OID,
            negator: INVALID_OID,
            can_merge: false,
            can_hash: false,
            complete: false,
        }
    }

    /// Build a complete row
    pub fn complete(oid: Oid, key: OperatorKey, owner: Oid, details: OperatorDetails) -> Self {
        let mut row = Self::shell(oid, key, owner);
        row.fill(details);
        row
    }

    /// Fill in the definition and mark the row complete. Partner links are
    /// left alone; the caller sets them.
    pub(crate) fn fill(&mut self, details: OperatorDetails) {
        self.result = details.result;
        self.procedure = details.procedure;
        self.restrict = details.restrict;
        self.join = details.join;
        self.can_merge = details.can_merge;
        self.can_hash = details.can_hash;
        self.complete = true;
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn key(&self) -> &OperatorKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn namespace(&self) -> Oid {
        self.key.namespace
    }

    pub fn left(&self) -> Oid {
        self.key.left
    }

    pub fn right(&self) -> Oid {
        self.key.right
    }

    pub fn owner(&self) -> Oid {
        self.owner
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    pub fn result(&self) -> Oid {
        self.result
    }

    pub fn procedure(&self) -> Oid {
        self.procedure
    }

    pub fn restrict(&self) -> Oid {
        self.restrict
    }

    pub fn join(&self) -> Oid {
        self.join
    }

    pub fn commutator(&self) -> Oid {
        self.commutator
    }

    pub fn negator(&self) -> Oid {
        self.negator
    }

    pub fn can_merge(&self) -> bool {
        self.can_merge
    }

    pub fn can_hash(&self) -> bool {
        self.can_hash
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_shell(&self) -> bool {
        !self.complete
    }

    pub(crate) fn set_owner(&mut self, owner: Oid) {
        self.owner = owner;
    }

    pub(crate) fn set_commutator(&mut self, oid: Oid) {
        self.commutator = oid;
    }

    pub(crate) fn set_negator(&mut self, oid: Oid) {
        self.negator = oid;
    }
}
