//! Operator Commands
//!
//! Define, alter-owner and remove, each running the same pipeline on every
//! node: resolve names, check permissions, decide identifiers, write rows,
//! maintain dependency edges. Only the [`PipelineMode`] differs between the
//! coordinator and the workers.

use std::collections::BTreeSet;
use std::sync::Arc;
use log::{debug, info};

use crate::catalog::bootstrap::BOOL_OID;
use crate::catalog::{Catalog, CatalogError, CatalogResult, ObjectAddress, OperatorDetails, OperatorKey};
use crate::common::types::{oid_is_valid, Oid, INVALID_OID};
use crate::transaction::{LockTag, Transaction};
use super::allocator::{IdentifierAllocator, OidAssignment, PartnerPlan, PartnerRef, PartnerRole, PipelineMode};
use super::definition::{parse_operator_definition, validate_operator_name, OperatorDefinition};
use super::dependency::DependencyTracker;
use super::mutator::CatalogMutator;
use super::outcome::{CommandOutcome, CommandStatus, Notice};
use super::permission::PermissionGuard;
use super::resolver::NameResolver;
use super::statement::{
    AlterOperatorOwnerStmt, CatalogStatement, DefineOperatorStmt, QualifiedName, RemoveOperatorStmt, Session,
};

/// Executes operator commands for one session in one mode
pub struct OperatorCommand<'a> {
    session: &'a Session,
    mode: PipelineMode<'a>,
}

impl<'a> OperatorCommand<'a> {
    pub fn new(session: &'a Session, mode: PipelineMode<'a>) -> Self {
        Self { session, mode }
    }

    /// Run `statement` inside `txn`. On error the caller must abort `txn`.
    pub fn execute(&self, txn: &mut Transaction, statement: &CatalogStatement) -> CatalogResult<CommandOutcome> {
        debug!("txn {}: {} as role {}", txn.id(), statement.tag(), self.session.user);
        match statement {
            CatalogStatement::DefineOperator(stmt) => self.define(txn, stmt),
            CatalogStatement::AlterOperatorOwner(stmt) => self.alter_owner(txn, stmt),
            CatalogStatement::RemoveOperator(stmt) => self.remove(txn, stmt),
        }
    }

    fn violation(&self, message: String) -> CatalogError {
        log::error!("protocol violation: {}", message);
        CatalogError::ProtocolViolation(message)
    }

    /// Define an operator, or complete the shell reserved for it
    pub fn define(&self, txn: &mut Transaction, stmt: &DefineOperatorStmt) -> CatalogResult<CommandOutcome> {
        let catalog: Arc<Catalog> = txn.catalog().clone();
        let user = self.session.user;
        let resolver = NameResolver::new(&catalog, self.session);
        let guard = PermissionGuard::new(&catalog);

        let (namespace, name) = resolver.creation_namespace(&stmt.name)?;
        guard.check_namespace_create(namespace, user)?;

        let def = parse_operator_definition(&stmt.definition)?;
        let mut notices: Vec<Notice> = def
            .ignored
            .iter()
            .map(|attr| Notice::warning(format!("operator attribute \"{}\" not recognized", attr)))
            .collect();

        validate_operator_name(&name)?;
        let (left, right) = resolver.operand_types(def.left.as_ref(), def.right.as_ref())?;

        let key = OperatorKey::new(name, namespace, left, right);
        let commutator_key = def
            .commutator
            .as_ref()
            .map(|n| resolver.partner_key(n, right, left))
            .transpose()?;
        let negator_key = def
            .negator
            .as_ref()
            .map(|n| resolver.partner_key(n, left, right))
            .transpose()?;

        let tags = std::iter::once(&key)
            .chain(commutator_key.iter())
            .chain(negator_key.iter())
            .map(|k| LockTag::Operator(k.clone()))
            .collect();
        txn.lock_all(tags)?;

        // Everything below reads the catalog under the operator locks
        let existing = catalog.operator_by_key(&key);
        if let Some(row) = &existing {
            let addr = ObjectAddress::operator(row.oid());
            if row.is_complete() {
                return Err(CatalogError::DuplicateObject(catalog.describe(&addr)));
            }
            guard.check_ownership(&addr, user)?;
        }

        let details = self.resolve_details(&resolver, &def, left, right)?;

        let partner = |key: Option<OperatorKey>| {
            key.map(|key| PartnerRef {
                existing: catalog.operator_by_key(&key),
                key,
            })
        };
        let commutator = partner(commutator_key);
        let negator = partner(negator_key);
        for p in [&commutator, &negator].into_iter().flatten() {
            if p.existing.is_none() && p.key != key && p.key.namespace != namespace {
                guard.check_namespace_create(p.key.namespace, user)?;
            }
        }

        let plan = IdentifierAllocator::new(&catalog, self.mode).plan(
            &key,
            existing.as_ref(),
            commutator.as_ref(),
            negator.as_ref(),
        )?;
        let own = plan.own;
        let links = [
            (&plan.commutator, PartnerRole::Commutator),
            (&plan.negator, PartnerRole::Negator),
        ];

        let mut touched = BTreeSet::from([own]);
        let mut mutator = CatalogMutator::new(&mut *txn);

        let mut shells = BTreeSet::new();
        for (partner_plan, role) in links {
            if let PartnerPlan::Shell { oid, key: shell_key } = partner_plan {
                if shells.insert(*oid) {
                    mutator.create_shell(*oid, shell_key.clone(), user)?;
                }
                mutator.set_link(*oid, role, own)?;
                touched.insert(*oid);
            }
        }

        let row = mutator.create_or_complete_shell(own, key, user, details)?;

        for (partner_plan, role) in links {
            let old = match role {
                PartnerRole::Commutator => row.commutator(),
                PartnerRole::Negator => row.negator(),
            };
            // A shell keeps a back-link it was given when the define names no partner
            let new = partner_plan.oid(own).unwrap_or(old);
            if new != old {
                mutator.set_link(own, role, new)?;
                if oid_is_valid(old) && old != own && mutator.clear_link_if(old, role, own)? {
                    touched.insert(old);
                }
            }
            if let PartnerPlan::Existing { oid } = partner_plan {
                let previous = mutator.set_link(*oid, role, own)?;
                touched.insert(*oid);
                if oid_is_valid(previous)
                    && previous != own
                    && previous != *oid
                    && mutator.clear_link_if(previous, role, *oid)?
                {
                    touched.insert(previous);
                }
            }
        }

        let mut tracker = DependencyTracker::new(&mut *txn);
        for oid in &touched {
            tracker.sync_operator_edges(*oid)?;
        }

        if plan.completes_shell {
            info!("completed shell operator {} as {}", own, catalog.describe(&ObjectAddress::operator(own)));
        } else {
            info!("defined {} with oid {}", catalog.describe(&ObjectAddress::operator(own)), own);
        }
        let mut outcome = CommandOutcome::new(CommandStatus::Defined, plan.assignment());
        outcome.notices.append(&mut notices);
        outcome.changes = txn.change_count();
        Ok(outcome)
    }

    /// Resolve the procedure and estimators, and check what the result type allows
    fn resolve_details(
        &self,
        resolver: &NameResolver<'_>,
        def: &OperatorDefinition,
        left: Oid,
        right: Oid,
    ) -> CatalogResult<OperatorDetails> {
        let args: Vec<Oid> = [left, right].into_iter().filter(|t| oid_is_valid(*t)).collect();
        let procedure = resolver.function(def.procedure()?, &args)?;
        let result = procedure.result_type();

        if result != BOOL_OID {
            let boolean_only = [
                (def.negator.is_some(), "only boolean operators can have negators"),
                (def.restrict.is_some(), "only boolean operators can have restriction selectivity"),
                (def.join.is_some(), "only boolean operators can have join selectivity"),
                (def.merges, "only boolean operators can merge join"),
                (def.hashes, "only boolean operators can hash"),
            ];
            if let Some((_, message)) = boolean_only.iter().find(|(set, _)| *set) {
                return Err(CatalogError::InvalidDefinition(message.to_string()));
            }
        }

        let estimator = |name: &Option<QualifiedName>| -> CatalogResult<Oid> {
            match name {
                Some(name) => Ok(resolver.function_by_name(name)?.oid()),
                None => Ok(INVALID_OID),
            }
        };
        Ok(OperatorDetails {
            result,
            procedure: procedure.oid(),
            restrict: estimator(&def.restrict)?,
            join: estimator(&def.join)?,
            can_merge: def.merges,
            can_hash: def.hashes,
        })
    }

    /// Give an operator a new owner. Handing it to its current owner
    /// succeeds without changing anything.
    pub fn alter_owner(&self, txn: &mut Transaction, stmt: &AlterOperatorOwnerStmt) -> CatalogResult<CommandOutcome> {
        let catalog: Arc<Catalog> = txn.catalog().clone();
        let resolver = NameResolver::new(&catalog, self.session);
        let guard = PermissionGuard::new(&catalog);
        let sig = &stmt.operator;

        let (left, right) = resolver.operand_types(sig.left.as_ref(), sig.right.as_ref())?;
        let found = resolver.find_operator(&sig.name, left, right);
        let new_owner = resolver.role(&stmt.new_owner)?.oid();

        let Some(found) = found else {
            return Err(self.missing_operator(&sig.to_string()));
        };
        txn.lock(LockTag::Operator(found.key().clone()))?;
        let Some(row) = catalog.operator(found.oid()) else {
            return Err(self.missing_operator(&sig.to_string()));
        };
        self.mode.confirm_target(row.oid())?;

        let addr = ObjectAddress::operator(row.oid());
        let mut outcome = CommandOutcome::new(CommandStatus::OwnerUnchanged, OidAssignment::for_operator(row.oid()));
        outcome.owner = Some(new_owner);
        if !guard.check_owner_transfer(&addr, self.session.user, new_owner)? {
            debug!("{} already owned by role {}", catalog.describe(&addr), new_owner);
            return Ok(outcome);
        }

        if CatalogMutator::new(&mut *txn).update_owner(row.oid(), new_owner)? {
            let mut tracker = DependencyTracker::new(&mut *txn);
            tracker.remove_owner_edge(addr, row.owner())?;
            tracker.add_owner_edge(addr, new_owner)?;
            outcome.status = CommandStatus::OwnerChanged;
            info!("{} now owned by role {}", catalog.describe(&addr), new_owner);
        }
        outcome.changes = txn.change_count();
        Ok(outcome)
    }

    /// Remove an operator, and with CASCADE everything that depends on it
    pub fn remove(&self, txn: &mut Transaction, stmt: &RemoveOperatorStmt) -> CatalogResult<CommandOutcome> {
        let catalog: Arc<Catalog> = txn.catalog().clone();
        let resolver = NameResolver::new(&catalog, self.session);
        let guard = PermissionGuard::new(&catalog);
        let sig = &stmt.operator;

        let found = match resolver.operand_types(sig.left.as_ref(), sig.right.as_ref()) {
            Ok((left, right)) => resolver.find_operator(&sig.name, left, right),
            Err(CatalogError::NotFound(_)) if stmt.missing_ok => None,
            Err(e) => return Err(e),
        };
        let Some(found) = found else {
            return self.skip_missing(stmt);
        };
        txn.lock(LockTag::Operator(found.key().clone()))?;
        // Removed by someone else while we waited for the lock
        let Some(row) = catalog.operator(found.oid()) else {
            return self.skip_missing(stmt);
        };
        self.mode.confirm_target(row.oid())?;

        let addr = ObjectAddress::operator(row.oid());
        guard.check_ownership(&addr, self.session.user)?;

        let mut outcome = CommandOutcome::new(CommandStatus::Removed, OidAssignment::for_operator(row.oid()));
        let description = catalog.describe(&addr);
        let deleted = DependencyTracker::new(&mut *txn).cascade_delete(addr, stmt.behavior, &mut outcome.notices)?;
        info!("removed {} ({} object(s))", description, deleted.len());
        outcome.changes = txn.change_count();
        Ok(outcome)
    }

    fn missing_operator(&self, signature: &str) -> CatalogError {
        if self.mode.is_apply() {
            return self.violation(format!("operator {} resolved on the coordinator but not here", signature));
        }
        CatalogError::NotFound(format!("operator {}", signature))
    }

    fn skip_missing(&self, stmt: &RemoveOperatorStmt) -> CatalogResult<CommandOutcome> {
        if !stmt.missing_ok || self.mode.is_apply() {
            return Err(self.missing_operator(&stmt.operator.to_string()));
        }
        let mut outcome = CommandOutcome::new(CommandStatus::Skipped, OidAssignment::default());
        outcome
            .notices
            .push(Notice::notice(format!("operator {} does not exist, skipping", stmt.operator.name)));
        Ok(outcome)
    }
}
