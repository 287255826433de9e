// Name Resolution
//
// Qualified names are looked up in their schema; unqualified names search
// pg_catalog first and then the session's search path. Objects are created in
// the first schema of the search path that exists.

use crate::catalog::bootstrap::PG_CATALOG_NAMESPACE;
use crate::catalog::{Catalog, CatalogError, CatalogResult, Function, OperatorKey, OperatorRow, Role};
use crate::common::types::{Oid, INVALID_OID};
use super::statement::{QualifiedName, Session, TypeName};

pub struct NameResolver<'a> {
    catalog: &'a Catalog,
    session: &'a Session,
}

impl<'a> NameResolver<'a> {
    pub fn new(catalog: &'a Catalog, session: &'a Session) -> Self {
        Self { catalog, session }
    }

    /// Namespaces searched for an unqualified name, in order
    pub fn search_namespaces(&self) -> Vec<Oid> {
        let mut path = vec![PG_CATALOG_NAMESPACE];
        for schema in &self.session.search_path {
            if let Some(ns) = self.catalog.namespace_by_name(schema) {
                if !path.contains(&ns.oid()) {
                    path.push(ns.oid());
                }
            }
        }
        path
    }

    fn explicit_namespace(&self, schema: &str) -> CatalogResult<Oid> {
        self.catalog
            .namespace_by_name(schema)
            .map(|ns| ns.oid())
            .ok_or_else(|| CatalogError::NotFound(format!("schema \"{}\"", schema)))
    }

    /// Namespaces a (possibly qualified) name may live in
    fn candidate_namespaces(&self, name: &QualifiedName) -> CatalogResult<Vec<Oid>> {
        match &name.schema {
            Some(schema) => Ok(vec![self.explicit_namespace(schema)?]),
            None => Ok(self.search_namespaces()),
        }
    }

    /// Resolve a name for creation: the namespace it goes into, and the bare name
    pub fn creation_namespace(&self, name: &QualifiedName) -> CatalogResult<(Oid, String)> {
        let namespace = match &name.schema {
            Some(schema) => self.explicit_namespace(schema)?,
            None => self
                .session
                .search_path
                .iter()
                .find_map(|schema| self.catalog.namespace_by_name(schema))
                .map(|ns| ns.oid())
                .ok_or_else(|| {
                    CatalogError::InvalidDefinition("no schema has been selected to create in".to_string())
                })?,
        };
        Ok((namespace, name.name.clone()))
    }

    /// Resolve a type used as an operator operand
    pub fn operand_type(&self, type_name: &TypeName) -> CatalogResult<Oid> {
        if type_name.setof {
            return Err(CatalogError::InvalidDefinition(
                "SETOF type not allowed for operator argument".to_string(),
            ));
        }
        let found = self
            .candidate_namespaces(&type_name.name)?
            .into_iter()
            .find_map(|ns| self.catalog.type_by_name(ns, &type_name.name.name))
            .ok_or_else(|| CatalogError::NotFound(format!("type \"{}\"", type_name.name)))?;
        if found.is_set_returning() {
            return Err(CatalogError::InvalidDefinition(format!(
                "type {} is a set type and cannot be an operator argument",
                found.name()
            )));
        }
        Ok(found.oid())
    }

    /// Resolve both operands; an absent operand is INVALID_OID
    pub fn operand_types(&self, left: Option<&TypeName>, right: Option<&TypeName>) -> CatalogResult<(Oid, Oid)> {
        let left = match left {
            Some(t) => self.operand_type(t)?,
            None => INVALID_OID,
        };
        let right = match right {
            Some(t) => self.operand_type(t)?,
            None => INVALID_OID,
        };
        Ok((left, right))
    }

    /// Find an existing operator (complete or shell). `None` is a forward
    /// reference, not an error.
    pub fn find_operator(&self, name: &QualifiedName, left: Oid, right: Oid) -> Option<OperatorRow> {
        let namespaces = self.candidate_namespaces(name).ok()?;
        namespaces
            .into_iter()
            .find_map(|ns| self.catalog.operator_by_key(&OperatorKey::new(name.name.clone(), ns, left, right)))
    }

    /// Key under which a commutator or negator reference lives: that of the
    /// existing operator if there is one, otherwise where a shell would go
    pub fn partner_key(&self, name: &QualifiedName, left: Oid, right: Oid) -> CatalogResult<OperatorKey> {
        if let Some(existing) = self.find_operator(name, left, right) {
            return Ok(existing.key().clone());
        }
        let (namespace, bare) = self.creation_namespace(name)?;
        Ok(OperatorKey::new(bare, namespace, left, right))
    }

    /// Find a function by name and exact argument types
    pub fn function(&self, name: &QualifiedName, arg_types: &[Oid]) -> CatalogResult<Function> {
        self.candidate_namespaces(name)?
            .into_iter()
            .flat_map(|ns| self.catalog.functions_named(ns, &name.name))
            .find(|f| f.arg_types() == arg_types)
            .ok_or_else(|| {
                let args: Vec<String> = arg_types.iter().map(|t| self.type_display(*t)).collect();
                CatalogError::NotFound(format!("function {}({})", name, args.join(",")))
            })
    }

    /// Find a function by name alone; used for selectivity estimators
    pub fn function_by_name(&self, name: &QualifiedName) -> CatalogResult<Function> {
        self.candidate_namespaces(name)?
            .into_iter()
            .flat_map(|ns| self.catalog.functions_named(ns, &name.name))
            .next()
            .ok_or_else(|| CatalogError::NotFound(format!("function {}", name)))
    }

    pub fn role(&self, name: &str) -> CatalogResult<Role> {
        self.catalog
            .role_by_name(name)
            .ok_or_else(|| CatalogError::NotFound(format!("role \"{}\"", name)))
    }

    fn type_display(&self, oid: Oid) -> String {
        self.catalog
            .catalog_type(oid)
            .map(|t| t.name().to_string())
            .unwrap_or_else(|| oid.to_string())
    }
}
