// Dependency Tracker
//
// Keeps the edge set of an operator equal to what its row references, and
// removes objects together with everything that depends on them.

use std::collections::BTreeSet;
use log::debug;

use crate::catalog::{
    Catalog, CatalogError, CatalogResult, CatalogRow, DependencyEdge, DependencyKind, ObjectAddress, ObjectClass,
    OperatorRow,
};
use crate::common::types::{oid_is_valid, DropBehavior, Oid};
use crate::transaction::Transaction;
use super::mutator::CatalogMutator;
use super::outcome::Notice;

/// The edges an operator row implies
pub fn operator_edges(row: &OperatorRow) -> Vec<DependencyEdge> {
    let me = ObjectAddress::operator(row.oid());
    let mut edges = vec![
        DependencyEdge::new(me, ObjectAddress::namespace(row.namespace()), DependencyKind::Owns),
        DependencyEdge::new(me, ObjectAddress::role(row.owner()), DependencyKind::Owns),
    ];
    let mut normal = |referenced: ObjectAddress| {
        if oid_is_valid(referenced.oid) && referenced != me {
            edges.push(DependencyEdge::new(me, referenced, DependencyKind::Normal));
        }
    };
    normal(ObjectAddress::type_(row.left()));
    normal(ObjectAddress::type_(row.right()));
    normal(ObjectAddress::type_(row.result()));
    normal(ObjectAddress::function(row.procedure()));
    normal(ObjectAddress::function(row.restrict()));
    normal(ObjectAddress::function(row.join()));
    normal(ObjectAddress::operator(row.commutator()));
    normal(ObjectAddress::operator(row.negator()));
    edges.sort();
    edges.dedup();
    edges
}

/// Commutator and negator links between operators are cleared when either
/// end goes away; they never force a cascade
fn is_partner_link(edge: &DependencyEdge) -> bool {
    edge.kind == DependencyKind::Normal
        && edge.dependent.class == ObjectClass::Operator
        && edge.referenced.class == ObjectClass::Operator
}

pub struct DependencyTracker<'t> {
    txn: &'t mut Transaction,
}

impl<'t> DependencyTracker<'t> {
    pub fn new(txn: &'t mut Transaction) -> Self {
        Self { txn }
    }

    fn catalog(&self) -> &Catalog {
        self.txn.catalog()
    }

    /// Insert edges. An edge to an object that does not exist means the
    /// command built an inconsistent plan, which is fatal.
    pub fn record_edges(&mut self, edges: &[DependencyEdge]) -> CatalogResult<()> {
        for edge in edges {
            for end in [edge.dependent, edge.referenced] {
                if !self.catalog().object_exists(&end) {
                    return Err(CatalogError::Internal(format!(
                        "dependency on nonexistent {} {}",
                        end.class, end.oid
                    )));
                }
            }
            self.txn.insert_edge(*edge)?;
        }
        Ok(())
    }

    /// Make the stored edges of operator `oid` match its row
    pub fn sync_operator_edges(&mut self, oid: Oid) -> CatalogResult<()> {
        let row = self
            .catalog()
            .operator(oid)
            .ok_or_else(|| CatalogError::Internal(format!("cache lookup failed for operator {}", oid)))?;
        let wanted: BTreeSet<DependencyEdge> = operator_edges(&row).into_iter().collect();
        let current: BTreeSet<DependencyEdge> = self
            .catalog()
            .edges_from(&ObjectAddress::operator(oid))
            .into_iter()
            .collect();

        for stale in current.difference(&wanted) {
            self.txn.remove_edge(stale)?;
        }
        let missing: Vec<DependencyEdge> = wanted.difference(&current).copied().collect();
        self.record_edges(&missing)
    }

    pub fn remove_owner_edge(&mut self, object: ObjectAddress, owner: Oid) -> CatalogResult<()> {
        let edge = DependencyEdge::new(object, ObjectAddress::role(owner), DependencyKind::Owns);
        self.txn.remove_edge(&edge)?;
        Ok(())
    }

    pub fn add_owner_edge(&mut self, object: ObjectAddress, new_owner: Oid) -> CatalogResult<()> {
        let edge = DependencyEdge::new(object, ObjectAddress::role(new_owner), DependencyKind::Owns);
        self.record_edges(&[edge])
    }

    /// Objects that must go when `target` goes, with the kind of the edge
    fn dependents(&self, target: &ObjectAddress) -> Vec<(ObjectAddress, DependencyKind)> {
        self.catalog()
            .edges_referencing(target)
            .into_iter()
            .filter(|e| e.dependent != *target && !is_partner_link(e))
            .map(|e| (e.dependent, e.kind))
            .collect()
    }

    fn refuse(&self, target: &ObjectAddress, dependents: &[ObjectAddress]) -> CatalogError {
        CatalogError::DependentObjectsExist {
            object: self.catalog().describe(target),
            dependents: dependents.iter().map(|d| self.catalog().describe(d)).collect(),
        }
    }

    /// Delete `target`. Under Restrict, fails without changing anything if
    /// something still depends on it; under Cascade, deletes the dependents
    /// first, depth-first. Auto dependents are always deleted silently.
    /// Returns every object deleted, target last.
    pub fn cascade_delete(
        &mut self,
        target: ObjectAddress,
        behavior: DropBehavior,
        notices: &mut Vec<Notice>,
    ) -> CatalogResult<Vec<ObjectAddress>> {
        if self.catalog().is_pinned(&target) {
            return Err(CatalogError::DependentObjectsExist {
                object: self.catalog().describe(&target),
                dependents: vec!["the database system".to_string()],
            });
        }
        let mut visited = BTreeSet::new();
        let mut deleted = Vec::new();
        self.delete_recursive(target, behavior, &mut visited, &mut deleted, notices)?;
        Ok(deleted)
    }

    fn delete_recursive(
        &mut self,
        target: ObjectAddress,
        behavior: DropBehavior,
        visited: &mut BTreeSet<ObjectAddress>,
        deleted: &mut Vec<ObjectAddress>,
        notices: &mut Vec<Notice>,
    ) -> CatalogResult<()> {
        if !visited.insert(target) {
            return Ok(());
        }
        let dependents: Vec<(ObjectAddress, DependencyKind)> = self
            .dependents(&target)
            .into_iter()
            .filter(|(d, _)| !visited.contains(d))
            .collect();

        if behavior == DropBehavior::Restrict {
            let blocking: Vec<ObjectAddress> = dependents
                .iter()
                .filter(|(_, kind)| *kind != DependencyKind::Auto)
                .map(|(d, _)| *d)
                .collect();
            if !blocking.is_empty() {
                return Err(self.refuse(&target, &blocking));
            }
        }

        for (dependent, kind) in dependents {
            if visited.contains(&dependent) {
                continue;
            }
            if self.catalog().is_pinned(&dependent) {
                return Err(self.refuse(&target, &[dependent]));
            }
            if kind != DependencyKind::Auto {
                notices.push(Notice::notice(format!("drop cascades to {}", self.catalog().describe(&dependent))));
            }
            self.delete_recursive(dependent, behavior, visited, deleted, notices)?;
        }

        self.delete_object(target)?;
        deleted.push(target);
        Ok(())
    }

    /// Remove one object's row and every edge mentioning it
    fn delete_object(&mut self, target: ObjectAddress) -> CatalogResult<()> {
        let row = self
            .catalog()
            .row(&target)
            .ok_or_else(|| CatalogError::Internal(format!("cache lookup failed for {} {}", target.class, target.oid)))?;
        debug!("deleting {}", self.catalog().describe(&target));

        let mentioning: Vec<DependencyEdge> = self
            .catalog()
            .edges()
            .into_iter()
            .filter(|e| e.mentions(&target))
            .collect();
        for edge in &mentioning {
            self.txn.remove_edge(edge)?;
        }

        match row {
            CatalogRow::Operator(op) => {
                let mut mutator = CatalogMutator::new(&mut *self.txn);
                mutator.clear_links_to(&op)?;
                mutator.delete_by_id(op.oid())?;
            }
            _ => {
                self.txn.remove_row(&target)?;
            }
        }
        Ok(())
    }
}
