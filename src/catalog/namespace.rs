// Namespace (schema) rows

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

use crate::common::types::Oid;

/// CREATE privileges granted on a namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceAcl {
    /// CREATE granted to every role
    public_create: bool,
    /// Roles explicitly granted CREATE
    create: BTreeSet<Oid>,
}

impl NamespaceAcl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public() -> Self {
        Self {
            public_create: true,
            create: BTreeSet::new(),
        }
    }

    pub fn grant_create(&mut self, role: Oid) {
        self.create.insert(role);
    }

    pub fn revoke_create(&mut self, role: Oid) {
        self.create.remove(&role);
    }

    pub fn public_create(&self) -> bool {
        self.public_create
    }

    pub fn grantees(&self) -> impl Iterator<Item = &Oid> {
        self.create.iter()
    }
}

/// A schema that holds catalog objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    oid: Oid,
    name: String,
    owner: Oid,
    acl: NamespaceAcl,
}

impl Namespace {
    pub fn new(oid: Oid, name: impl Into<String>, owner: Oid, acl: NamespaceAcl) -> Self {
        Self {
            oid,
            name: name.into(),
            owner,
            acl,
        }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Oid {
        self.owner
    }

    pub fn acl(&self) -> &NamespaceAcl {
        &self.acl
    }

    pub(crate) fn acl_mut(&mut self) -> &mut NamespaceAcl {
        &mut self.acl
    }
}
