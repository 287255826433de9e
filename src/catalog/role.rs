// Role rows

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

use crate::common::types::Oid;

/// A role that can own objects and hold privileges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    oid: Oid,
    name: String,
    superuser: bool,
    /// Roles this role is a direct member of
    member_of: BTreeSet<Oid>,
}

impl Role {
    pub fn new(oid: Oid, name: impl Into<String>, superuser: bool) -> Self {
        Self {
            oid,
            name: name.into(),
            superuser,
            member_of: BTreeSet::new(),
        }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_superuser(&self) -> bool {
        self.superuser
    }

    pub fn member_of(&self) -> impl Iterator<Item = &Oid> {
        self.member_of.iter()
    }

    pub(crate) fn add_membership(&mut self, group: Oid) {
        self.member_of.insert(group);
    }
}
