use std::collections::{BTreeMap, BTreeSet, HashMap};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::common::types::{Oid, FIRST_NORMAL_OID};
use crate::transaction::UndoRecord;
use super::bootstrap;
use super::dependency::{DependencyEdge, DependencyKind, ObjectAddress, ObjectClass};
use super::error::{CatalogError, CatalogResult};
use super::function::{CatalogType, Function};
use super::namespace::Namespace;
use super::operator::{OperatorKey, OperatorRow};
use super::role::Role;

/// One row of any catalog class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogRow {
    Namespace(Namespace),
    Role(Role),
    Type(CatalogType),
    Function(Function),
    Operator(OperatorRow),
}

impl CatalogRow {
    pub fn address(&self) -> ObjectAddress {
        match self {
            CatalogRow::Namespace(n) => ObjectAddress::namespace(n.oid()),
            CatalogRow::Role(r) => ObjectAddress::role(r.oid()),
            CatalogRow::Type(t) => ObjectAddress::type_(t.oid()),
            CatalogRow::Function(f) => ObjectAddress::function(f.oid()),
            CatalogRow::Operator(o) => ObjectAddress::operator(o.oid()),
        }
    }

    /// Owning role, for classes that have one
    pub fn owner(&self) -> Option<Oid> {
        match self {
            CatalogRow::Namespace(n) => Some(n.owner()),
            CatalogRow::Function(f) => Some(f.owner()),
            CatalogRow::Operator(o) => Some(o.owner()),
            CatalogRow::Role(_) | CatalogRow::Type(_) => None,
        }
    }

    /// Containing namespace, for namespaced classes
    pub fn namespace(&self) -> Option<Oid> {
        match self {
            CatalogRow::Type(t) => Some(t.namespace()),
            CatalogRow::Function(f) => Some(f.namespace()),
            CatalogRow::Operator(o) => Some(o.namespace()),
            CatalogRow::Namespace(_) | CatalogRow::Role(_) => None,
        }
    }
}

/// Point-in-time copy of the mutable part of a catalog, used to compare nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub operators: Vec<OperatorRow>,
    pub edges: Vec<DependencyEdge>,
}

#[derive(Debug, Default)]
struct CatalogState {
    namespaces: BTreeMap<Oid, Namespace>,
    roles: BTreeMap<Oid, Role>,
    types: BTreeMap<Oid, CatalogType>,
    functions: BTreeMap<Oid, Function>,
    operators: BTreeMap<Oid, OperatorRow>,
    operator_keys: HashMap<OperatorKey, Oid>,
    edges: BTreeSet<DependencyEdge>,
}

impl CatalogState {
    fn contains(&self, addr: &ObjectAddress) -> bool {
        match addr.class {
            ObjectClass::Namespace => self.namespaces.contains_key(&addr.oid),
            ObjectClass::Role => self.roles.contains_key(&addr.oid),
            ObjectClass::Type => self.types.contains_key(&addr.oid),
            ObjectClass::Function => self.functions.contains_key(&addr.oid),
            ObjectClass::Operator => self.operators.contains_key(&addr.oid),
        }
    }

    fn oid_in_use(&self, oid: Oid) -> bool {
        self.namespaces.contains_key(&oid)
            || self.roles.contains_key(&oid)
            || self.types.contains_key(&oid)
            || self.functions.contains_key(&oid)
            || self.operators.contains_key(&oid)
    }

    fn get(&self, addr: &ObjectAddress) -> Option<CatalogRow> {
        match addr.class {
            ObjectClass::Namespace => self.namespaces.get(&addr.oid).cloned().map(CatalogRow::Namespace),
            ObjectClass::Role => self.roles.get(&addr.oid).cloned().map(CatalogRow::Role),
            ObjectClass::Type => self.types.get(&addr.oid).cloned().map(CatalogRow::Type),
            ObjectClass::Function => self.functions.get(&addr.oid).cloned().map(CatalogRow::Function),
            ObjectClass::Operator => self.operators.get(&addr.oid).cloned().map(CatalogRow::Operator),
        }
    }

    fn put(&mut self, row: CatalogRow) -> Option<CatalogRow> {
        match row {
            CatalogRow::Namespace(n) => self.namespaces.insert(n.oid(), n).map(CatalogRow::Namespace),
            CatalogRow::Role(r) => self.roles.insert(r.oid(), r).map(CatalogRow::Role),
            CatalogRow::Type(t) => self.types.insert(t.oid(), t).map(CatalogRow::Type),
            CatalogRow::Function(f) => self.functions.insert(f.oid(), f).map(CatalogRow::Function),
            CatalogRow::Operator(o) => {
                let oid = o.oid();
                let key = o.key().clone();
                let before = self.operators.insert(oid, o);
                if let Some(old) = &before {
                    if old.key() != &key {
                        self.operator_keys.remove(old.key());
                    }
                }
                self.operator_keys.insert(key, oid);
                before.map(CatalogRow::Operator)
            }
        }
    }

    fn remove(&mut self, addr: &ObjectAddress) -> Option<CatalogRow> {
        match addr.class {
            ObjectClass::Namespace => self.namespaces.remove(&addr.oid).map(CatalogRow::Namespace),
            ObjectClass::Role => self.roles.remove(&addr.oid).map(CatalogRow::Role),
            ObjectClass::Type => self.types.remove(&addr.oid).map(CatalogRow::Type),
            ObjectClass::Function => self.functions.remove(&addr.oid).map(CatalogRow::Function),
            ObjectClass::Operator => {
                let removed = self.operators.remove(&addr.oid);
                if let Some(row) = &removed {
                    self.operator_keys.remove(row.key());
                }
                removed.map(CatalogRow::Operator)
            }
        }
    }
}

/// The catalog of one cluster node: an in-memory, key-indexed row store.
///
/// Reads take the state latch shared; every write holds it exclusively for
/// exactly one row or edge change. Transactional writes go through
/// [`crate::transaction::Transaction`], which records the before-image so the
/// change can be rolled back.
#[derive(Debug)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a catalog holding the bootstrap objects
    pub fn new() -> Self {
        let catalog = Self::empty();
        {
            let mut state = catalog.state.write();
            for row in bootstrap::BOOTSTRAP_ROWS.iter() {
                state.put(row.clone());
            }
        }
        catalog
    }

    /// Create a catalog with no objects at all (primarily for testing)
    pub fn empty() -> Self {
        Catalog {
            state: RwLock::new(CatalogState::default()),
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn namespace(&self, oid: Oid) -> Option<Namespace> {
        self.state.read().namespaces.get(&oid).cloned()
    }

    pub fn namespace_by_name(&self, name: &str) -> Option<Namespace> {
        self.state.read().namespaces.values().find(|n| n.name() == name).cloned()
    }

    pub fn role(&self, oid: Oid) -> Option<Role> {
        self.state.read().roles.get(&oid).cloned()
    }

    pub fn role_by_name(&self, name: &str) -> Option<Role> {
        self.state.read().roles.values().find(|r| r.name() == name).cloned()
    }

    pub fn catalog_type(&self, oid: Oid) -> Option<CatalogType> {
        self.state.read().types.get(&oid).cloned()
    }

    pub fn type_by_name(&self, namespace: Oid, name: &str) -> Option<CatalogType> {
        self.state
            .read()
            .types
            .values()
            .find(|t| t.namespace() == namespace && t.name() == name)
            .cloned()
    }

    pub fn function(&self, oid: Oid) -> Option<Function> {
        self.state.read().functions.get(&oid).cloned()
    }

    /// All functions with the given name in the given namespace
    pub fn functions_named(&self, namespace: Oid, name: &str) -> Vec<Function> {
        self.state
            .read()
            .functions
            .values()
            .filter(|f| f.namespace() == namespace && f.name() == name)
            .cloned()
            .collect()
    }

    pub fn operator(&self, oid: Oid) -> Option<OperatorRow> {
        self.state.read().operators.get(&oid).cloned()
    }

    pub fn operator_by_key(&self, key: &OperatorKey) -> Option<OperatorRow> {
        let state = self.state.read();
        state
            .operator_keys
            .get(key)
            .and_then(|oid| state.operators.get(oid))
            .cloned()
    }

    /// All operator rows, ordered by oid
    pub fn operators(&self) -> Vec<OperatorRow> {
        self.state.read().operators.values().cloned().collect()
    }

    pub fn operators_named(&self, name: &str) -> Vec<OperatorRow> {
        self.state
            .read()
            .operators
            .values()
            .filter(|o| o.name() == name)
            .cloned()
            .collect()
    }

    pub fn row(&self, addr: &ObjectAddress) -> Option<CatalogRow> {
        self.state.read().get(addr)
    }

    pub fn object_exists(&self, addr: &ObjectAddress) -> bool {
        self.state.read().contains(addr)
    }

    /// True if any catalog class already uses the identifier
    pub fn oid_in_use(&self, oid: Oid) -> bool {
        self.state.read().oid_in_use(oid)
    }

    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.state.read().edges.iter().copied().collect()
    }

    /// Edges whose referenced end is `addr`
    pub fn edges_referencing(&self, addr: &ObjectAddress) -> Vec<DependencyEdge> {
        self.state
            .read()
            .edges
            .iter()
            .filter(|e| e.referenced == *addr)
            .copied()
            .collect()
    }

    /// Edges whose dependent end is `addr`
    pub fn edges_from(&self, addr: &ObjectAddress) -> Vec<DependencyEdge> {
        self.state
            .read()
            .edges
            .iter()
            .filter(|e| e.dependent == *addr)
            .copied()
            .collect()
    }

    /// Human-readable description used in messages, e.g. `operator public.<(int4,int4)`
    pub fn describe(&self, addr: &ObjectAddress) -> String {
        let state = self.state.read();
        let type_name = |oid: Oid| -> String {
            state
                .types
                .get(&oid)
                .map(|t| t.name().to_string())
                .unwrap_or_else(|| "NONE".to_string())
        };
        let ns_name = |oid: Oid| -> String {
            state
                .namespaces
                .get(&oid)
                .map(|n| n.name().to_string())
                .unwrap_or_else(|| oid.to_string())
        };
        match state.get(addr) {
            Some(CatalogRow::Operator(o)) => format!(
                "operator {}.{}({},{})",
                ns_name(o.namespace()),
                o.name(),
                type_name(o.left()),
                type_name(o.right())
            ),
            Some(CatalogRow::Namespace(n)) => format!("schema {}", n.name()),
            Some(CatalogRow::Role(r)) => format!("role {}", r.name()),
            Some(CatalogRow::Type(t)) => format!("type {}", t.name()),
            Some(CatalogRow::Function(f)) => {
                let args: Vec<String> = f.arg_types().iter().map(|a| type_name(*a)).collect();
                format!("function {}.{}({})", ns_name(f.namespace()), f.name(), args.join(","))
            }
            None => format!("{} {}", addr.class, addr.oid),
        }
    }

    /// Objects created at bootstrap are pinned and can never be dropped
    pub fn is_pinned(&self, addr: &ObjectAddress) -> bool {
        addr.oid < FIRST_NORMAL_OID
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state.read();
        CatalogSnapshot {
            operators: state.operators.values().cloned().collect(),
            edges: state.edges.iter().copied().collect(),
        }
    }

    // ------------------------------------------------------------------
    // Raw writes, used by Transaction (which records undo) and rollback
    // ------------------------------------------------------------------

    pub(crate) fn write_row(&self, row: CatalogRow) -> Option<CatalogRow> {
        self.state.write().put(row)
    }

    pub(crate) fn delete_row(&self, addr: &ObjectAddress) -> Option<CatalogRow> {
        self.state.write().remove(addr)
    }

    pub(crate) fn add_edge(&self, edge: DependencyEdge) -> bool {
        self.state.write().edges.insert(edge)
    }

    pub(crate) fn drop_edge(&self, edge: &DependencyEdge) -> bool {
        self.state.write().edges.remove(edge)
    }

    /// Undo one recorded change. Never records anything itself.
    pub(crate) fn apply_undo(&self, record: UndoRecord) {
        let mut state = self.state.write();
        match record {
            UndoRecord::Row { address, before } => {
                state.remove(&address);
                if let Some(row) = before {
                    state.put(row);
                }
            }
            UndoRecord::EdgeInserted(edge) => {
                state.edges.remove(&edge);
            }
            UndoRecord::EdgeRemoved(edge) => {
                state.edges.insert(edge);
            }
        }
    }

    // ------------------------------------------------------------------
    // Setup. These run outside any transaction and must be applied
    // identically on every node of a cluster.
    // ------------------------------------------------------------------

    pub fn create_role(&self, role: Role) -> CatalogResult<()> {
        let mut state = self.state.write();
        if state.oid_in_use(role.oid()) {
            return Err(CatalogError::DuplicateObject(format!("object with oid {}", role.oid())));
        }
        if state.roles.values().any(|r| r.name() == role.name()) {
            return Err(CatalogError::DuplicateObject(format!("role \"{}\"", role.name())));
        }
        state.put(CatalogRow::Role(role));
        Ok(())
    }

    /// Make `member` a member of `group`
    pub fn grant_role(&self, member: Oid, group: Oid) -> CatalogResult<()> {
        let mut state = self.state.write();
        if !state.roles.contains_key(&group) {
            return Err(CatalogError::NotFound(format!("role {}", group)));
        }
        let role = state
            .roles
            .get_mut(&member)
            .ok_or_else(|| CatalogError::NotFound(format!("role {}", member)))?;
        role.add_membership(group);
        Ok(())
    }

    pub fn create_namespace(&self, namespace: Namespace) -> CatalogResult<()> {
        let mut state = self.state.write();
        if state.oid_in_use(namespace.oid()) {
            return Err(CatalogError::DuplicateObject(format!("object with oid {}", namespace.oid())));
        }
        if state.namespaces.values().any(|n| n.name() == namespace.name()) {
            return Err(CatalogError::DuplicateObject(format!("schema \"{}\"", namespace.name())));
        }
        let owner = ObjectAddress::role(namespace.owner());
        if !state.contains(&owner) {
            return Err(CatalogError::NotFound(format!("role {}", namespace.owner())));
        }
        let addr = ObjectAddress::namespace(namespace.oid());
        state.put(CatalogRow::Namespace(namespace));
        state.edges.insert(DependencyEdge::new(addr, owner, DependencyKind::Owns));
        Ok(())
    }

    /// Grant CREATE on a namespace to a role
    pub fn grant_create(&self, namespace: Oid, role: Oid) -> CatalogResult<()> {
        let mut state = self.state.write();
        if !state.roles.contains_key(&role) {
            return Err(CatalogError::NotFound(format!("role {}", role)));
        }
        let ns = state
            .namespaces
            .get_mut(&namespace)
            .ok_or_else(|| CatalogError::NotFound(format!("schema {}", namespace)))?;
        ns.acl_mut().grant_create(role);
        Ok(())
    }

    pub fn create_type(&self, catalog_type: CatalogType) -> CatalogResult<()> {
        let mut state = self.state.write();
        if state.oid_in_use(catalog_type.oid()) {
            return Err(CatalogError::DuplicateObject(format!("object with oid {}", catalog_type.oid())));
        }
        let ns = ObjectAddress::namespace(catalog_type.namespace());
        if !state.contains(&ns) {
            return Err(CatalogError::NotFound(format!("schema {}", catalog_type.namespace())));
        }
        let addr = ObjectAddress::type_(catalog_type.oid());
        state.put(CatalogRow::Type(catalog_type));
        state.edges.insert(DependencyEdge::new(addr, ns, DependencyKind::Owns));
        Ok(())
    }

    pub fn create_function(&self, function: Function) -> CatalogResult<()> {
        let mut state = self.state.write();
        if state.oid_in_use(function.oid()) {
            return Err(CatalogError::DuplicateObject(format!("object with oid {}", function.oid())));
        }
        let ns = ObjectAddress::namespace(function.namespace());
        let owner = ObjectAddress::role(function.owner());
        for required in [ns, owner] {
            if !state.contains(&required) {
                return Err(CatalogError::NotFound(format!("{} {}", required.class, required.oid)));
            }
        }
        let result_type = function.result_type();
        for arg in function.arg_types().iter().chain(std::iter::once(&result_type)) {
            if !state.types.contains_key(arg) {
                return Err(CatalogError::NotFound(format!("type {}", arg)));
            }
        }
        let addr = ObjectAddress::function(function.oid());
        state.put(CatalogRow::Function(function));
        state.edges.insert(DependencyEdge::new(addr, ns, DependencyKind::Owns));
        state.edges.insert(DependencyEdge::new(addr, owner, DependencyKind::Owns));
        Ok(())
    }

    /// Declare an extra dependency between two existing objects, e.g. a
    /// function whose body uses an operator
    pub fn record_dependency(&self, edge: DependencyEdge) -> CatalogResult<()> {
        let mut state = self.state.write();
        for end in [edge.dependent, edge.referenced] {
            if !state.contains(&end) {
                return Err(CatalogError::NotFound(format!("{} {}", end.class, end.oid)));
            }
        }
        state.edges.insert(edge);
        Ok(())
    }
}
