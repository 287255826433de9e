// Catalog Mutator
//
// Row-level writes of the operator commands. Every row is locked for update
// before it is read and rewritten; all writes go through the transaction so
// they roll back together.

use log::debug;

use crate::catalog::{Catalog, CatalogError, CatalogResult, CatalogRow, ObjectAddress, OperatorDetails, OperatorKey, OperatorRow};
use crate::common::types::{oid_is_valid, Oid, INVALID_OID};
use crate::transaction::{LockTag, Transaction};
use super::allocator::PartnerRole;

pub struct CatalogMutator<'t> {
    txn: &'t mut Transaction,
}

impl<'t> CatalogMutator<'t> {
    pub fn new(txn: &'t mut Transaction) -> Self {
        Self { txn }
    }

    fn catalog(&self) -> &Catalog {
        self.txn.catalog()
    }

    fn lock_row(&mut self, oid: Oid) -> CatalogResult<()> {
        self.txn.lock(LockTag::Object(ObjectAddress::operator(oid)))?;
        Ok(())
    }

    /// Read a row for update
    fn fetch_for_update(&mut self, oid: Oid) -> CatalogResult<OperatorRow> {
        self.lock_row(oid)?;
        self.catalog()
            .operator(oid)
            .ok_or_else(|| CatalogError::Internal(format!("cache lookup failed for operator {}", oid)))
    }

    fn store(&mut self, row: OperatorRow) -> CatalogResult<()> {
        self.txn.put_row(CatalogRow::Operator(row))?;
        Ok(())
    }

    /// Insert a shell reserving `oid` for `key`
    pub fn create_shell(&mut self, oid: Oid, key: OperatorKey, owner: Oid) -> CatalogResult<OperatorRow> {
        self.lock_row(oid)?;
        if self.catalog().oid_in_use(oid) {
            return Err(CatalogError::Internal(format!("oid {} is already in use", oid)));
        }
        if let Some(existing) = self.catalog().operator_by_key(&key) {
            return Err(CatalogError::DuplicateObject(self.catalog().describe(&ObjectAddress::operator(existing.oid()))));
        }
        debug!("creating shell operator {} for \"{}\"", oid, key.name);
        let row = OperatorRow::shell(oid, key, owner);
        self.store(row.clone())?;
        Ok(row)
    }

    /// Complete the shell under `oid` if there is one, otherwise insert a new
    /// complete row. Partner links on an existing shell are kept.
    pub fn create_or_complete_shell(
        &mut self,
        oid: Oid,
        key: OperatorKey,
        owner: Oid,
        details: OperatorDetails,
    ) -> CatalogResult<OperatorRow> {
        self.lock_row(oid)?;
        let row = match self.catalog().operator(oid) {
            Some(mut shell) if shell.is_shell() => {
                if shell.key() != &key {
                    return Err(CatalogError::Internal(format!(
                        "shell {} is registered as \"{}\", not \"{}\"",
                        oid,
                        shell.name(),
                        key.name
                    )));
                }
                debug!("completing shell operator {}", oid);
                shell.fill(details);
                shell.set_owner(owner);
                shell
            }
            Some(_) => {
                return Err(CatalogError::DuplicateObject(self.catalog().describe(&ObjectAddress::operator(oid))));
            }
            None => {
                if self.catalog().oid_in_use(oid) {
                    return Err(CatalogError::Internal(format!("oid {} is already in use", oid)));
                }
                OperatorRow::complete(oid, key, owner, details)
            }
        };
        self.store(row.clone())?;
        Ok(row)
    }

    /// Point one link of `oid` at `target` (INVALID_OID clears it). Returns
    /// the previous value.
    pub fn set_link(&mut self, oid: Oid, role: PartnerRole, target: Oid) -> CatalogResult<Oid> {
        let mut row = self.fetch_for_update(oid)?;
        let previous = match role {
            PartnerRole::Commutator => row.commutator(),
            PartnerRole::Negator => row.negator(),
        };
        if previous != target {
            match role {
                PartnerRole::Commutator => row.set_commutator(target),
                PartnerRole::Negator => row.set_negator(target),
            }
            self.store(row)?;
        }
        Ok(previous)
    }

    /// Clear `oid`'s link of the given kind if it still points at `target`
    pub fn clear_link_if(&mut self, oid: Oid, role: PartnerRole, target: Oid) -> CatalogResult<bool> {
        if !self.catalog().object_exists(&ObjectAddress::operator(oid)) {
            return Ok(false);
        }
        let row = self.fetch_for_update(oid)?;
        let current = match role {
            PartnerRole::Commutator => row.commutator(),
            PartnerRole::Negator => row.negator(),
        };
        if current != target {
            return Ok(false);
        }
        self.set_link(oid, role, INVALID_OID)?;
        Ok(true)
    }

    /// Clear every partner link pointing at `row`. Returns the partners changed.
    pub fn clear_links_to(&mut self, row: &OperatorRow) -> CatalogResult<Vec<Oid>> {
        let mut touched = Vec::new();
        for (partner, role) in [
            (row.commutator(), PartnerRole::Commutator),
            (row.negator(), PartnerRole::Negator),
        ] {
            if oid_is_valid(partner) && partner != row.oid() && self.clear_link_if(partner, role, row.oid())? {
                touched.push(partner);
            }
        }
        Ok(touched)
    }

    /// Change the owner; false if `new_owner` already owns it
    pub fn update_owner(&mut self, oid: Oid, new_owner: Oid) -> CatalogResult<bool> {
        let mut row = self.fetch_for_update(oid)?;
        if row.owner() == new_owner {
            return Ok(false);
        }
        row.set_owner(new_owner);
        self.store(row)?;
        Ok(true)
    }

    /// Remove the row. The caller has already established that it exists, so
    /// a missing row is an internal error.
    pub fn delete_by_id(&mut self, oid: Oid) -> CatalogResult<OperatorRow> {
        self.lock_row(oid)?;
        match self.txn.remove_row(&ObjectAddress::operator(oid))? {
            Some(CatalogRow::Operator(row)) => Ok(row),
            _ => Err(CatalogError::Internal(format!("cache lookup failed for operator {}", oid))),
        }
    }
}
