// Permission Checks
//
// The two privileges the operator commands need: CREATE on a namespace and
// ownership of an object. Role membership is transitive; a member of a role
// holds that role's privileges.

use std::collections::{BTreeSet, VecDeque};

use crate::catalog::{Catalog, CatalogError, CatalogResult, ObjectAddress};
use crate::common::types::Oid;

pub struct PermissionGuard<'a> {
    catalog: &'a Catalog,
}

impl<'a> PermissionGuard<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn is_superuser(&self, role: Oid) -> bool {
        self.catalog.role(role).is_some_and(|r| r.is_superuser())
    }

    /// True if `role` is `group` or a direct or indirect member of it
    pub fn is_member_of(&self, role: Oid, group: Oid) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([role]);
        while let Some(current) = queue.pop_front() {
            if current == group {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(r) = self.catalog.role(current) {
                queue.extend(r.member_of().copied());
            }
        }
        false
    }

    /// True if `role` holds the privileges of `owner`
    fn has_privs_of(&self, role: Oid, owner: Oid) -> bool {
        self.is_superuser(role) || self.is_member_of(role, owner)
    }

    pub fn has_namespace_create(&self, namespace: Oid, role: Oid) -> bool {
        let Some(ns) = self.catalog.namespace(namespace) else {
            return false;
        };
        self.has_privs_of(role, ns.owner())
            || ns.acl().public_create()
            || ns.acl().grantees().any(|grantee| self.is_member_of(role, *grantee))
    }

    pub fn check_namespace_create(&self, namespace: Oid, role: Oid) -> CatalogResult<()> {
        if self.has_namespace_create(namespace, role) {
            return Ok(());
        }
        Err(CatalogError::PermissionDenied(format!(
            "no CREATE privilege on {}",
            self.catalog.describe(&ObjectAddress::namespace(namespace))
        )))
    }

    /// Succeeds if `role` owns the object, owns its namespace, or is a superuser
    pub fn check_ownership(&self, object: &ObjectAddress, role: Oid) -> CatalogResult<()> {
        let row = self
            .catalog
            .row(object)
            .ok_or_else(|| CatalogError::NotFound(self.catalog.describe(object)))?;

        let owns_object = row.owner().is_some_and(|owner| self.has_privs_of(role, owner));
        let owns_namespace = row
            .namespace()
            .and_then(|ns| self.catalog.namespace(ns))
            .is_some_and(|ns| self.has_privs_of(role, ns.owner()));

        if owns_object || owns_namespace {
            return Ok(());
        }
        Err(CatalogError::PermissionDenied(format!(
            "must be owner of {}",
            self.catalog.describe(object)
        )))
    }

    /// Check that `role` may hand `object` to `new_owner`. Returns false if
    /// `new_owner` already owns it, in which case there is nothing to do.
    pub fn check_owner_transfer(&self, object: &ObjectAddress, role: Oid, new_owner: Oid) -> CatalogResult<bool> {
        let row = self
            .catalog
            .row(object)
            .ok_or_else(|| CatalogError::NotFound(self.catalog.describe(object)))?;
        if row.owner() == Some(new_owner) {
            return Ok(false);
        }
        if self.is_superuser(role) {
            return Ok(true);
        }

        let owner = row.owner().unwrap_or_default();
        if !self.is_member_of(role, owner) {
            return Err(CatalogError::PermissionDenied(format!(
                "must be owner of {}",
                self.catalog.describe(object)
            )));
        }
        if !self.is_member_of(role, new_owner) {
            return Err(CatalogError::PermissionDenied(format!(
                "must be member of {}",
                self.catalog.describe(&ObjectAddress::role(new_owner))
            )));
        }
        if let Some(namespace) = row.namespace() {
            if !self.has_namespace_create(namespace, new_owner) {
                return Err(CatalogError::PermissionDenied(format!(
                    "{} has no CREATE privilege on {}",
                    self.catalog.describe(&ObjectAddress::role(new_owner)),
                    self.catalog.describe(&ObjectAddress::namespace(namespace))
                )));
            }
        }
        Ok(true)
    }
}
