// Bootstrap catalog contents
//
// Every node starts from exactly these rows, so their oids are fixed and
// lie below FIRST_NORMAL_OID. Bootstrap objects carry no dependency edges;
// they are pinned.

use once_cell::sync::Lazy;

use crate::common::types::Oid;
use super::catalog::CatalogRow;
use super::function::{CatalogType, Function};
use super::namespace::{Namespace, NamespaceAcl};
use super::role::Role;

pub const BOOTSTRAP_SUPERUSER: Oid = 10;
pub const PG_CATALOG_NAMESPACE: Oid = 11;
pub const PUBLIC_NAMESPACE: Oid = 2200;

pub const BOOL_OID: Oid = 16;
pub const INT8_OID: Oid = 20;
pub const INT4_OID: Oid = 23;
pub const TEXT_OID: Oid = 25;
pub const FLOAT8_OID: Oid = 701;
pub const DATE_OID: Oid = 1082;
pub const RECORD_OID: Oid = 2249;

/// (oid, name, argument types, result type)
const BUILTIN_FUNCTIONS: &[(Oid, &str, &[Oid], Oid)] = &[
    (65, "int4eq", &[INT4_OID, INT4_OID], BOOL_OID),
    (66, "int4lt", &[INT4_OID, INT4_OID], BOOL_OID),
    (144, "int4ne", &[INT4_OID, INT4_OID], BOOL_OID),
    (147, "int4gt", &[INT4_OID, INT4_OID], BOOL_OID),
    (149, "int4le", &[INT4_OID, INT4_OID], BOOL_OID),
    (150, "int4ge", &[INT4_OID, INT4_OID], BOOL_OID),
    (177, "int4pl", &[INT4_OID, INT4_OID], INT4_OID),
    (181, "int4mi", &[INT4_OID, INT4_OID], INT4_OID),
    (212, "int4um", &[INT4_OID], INT4_OID),
    (1230, "int8fac", &[INT8_OID], INT8_OID),
    (467, "int8eq", &[INT8_OID, INT8_OID], BOOL_OID),
    (469, "int8lt", &[INT8_OID, INT8_OID], BOOL_OID),
    (67, "texteq", &[TEXT_OID, TEXT_OID], BOOL_OID),
    (157, "textne", &[TEXT_OID, TEXT_OID], BOOL_OID),
    (740, "text_lt", &[TEXT_OID, TEXT_OID], BOOL_OID),
    (742, "text_gt", &[TEXT_OID, TEXT_OID], BOOL_OID),
    (1086, "date_eq", &[DATE_OID, DATE_OID], BOOL_OID),
    // Selectivity estimators. Their real argument lists are internal, so
    // they are resolved by name alone.
    (101, "eqsel", &[], FLOAT8_OID),
    (102, "neqsel", &[], FLOAT8_OID),
    (103, "scalarltsel", &[], FLOAT8_OID),
    (104, "scalargtsel", &[], FLOAT8_OID),
    (105, "eqjoinsel", &[], FLOAT8_OID),
    (106, "neqjoinsel", &[], FLOAT8_OID),
    (107, "scalarltjoinsel", &[], FLOAT8_OID),
    (108, "scalargtjoinsel", &[], FLOAT8_OID),
];

pub(crate) static BOOTSTRAP_ROWS: Lazy<Vec<CatalogRow>> = Lazy::new(|| {
    let mut rows = vec![
        CatalogRow::Role(Role::new(BOOTSTRAP_SUPERUSER, "admin", true)),
        CatalogRow::Namespace(Namespace::new(
            PG_CATALOG_NAMESPACE,
            "pg_catalog",
            BOOTSTRAP_SUPERUSER,
            NamespaceAcl::new(),
        )),
        CatalogRow::Namespace(Namespace::new(
            PUBLIC_NAMESPACE,
            "public",
            BOOTSTRAP_SUPERUSER,
            NamespaceAcl::public(),
        )),
    ];

    let types = [
        CatalogType::new(BOOL_OID, "bool", PG_CATALOG_NAMESPACE),
        CatalogType::new(INT8_OID, "int8", PG_CATALOG_NAMESPACE),
        CatalogType::new(INT4_OID, "int4", PG_CATALOG_NAMESPACE),
        CatalogType::new(TEXT_OID, "text", PG_CATALOG_NAMESPACE),
        CatalogType::new(FLOAT8_OID, "float8", PG_CATALOG_NAMESPACE),
        CatalogType::new(DATE_OID, "date", PG_CATALOG_NAMESPACE),
        CatalogType::new(RECORD_OID, "record", PG_CATALOG_NAMESPACE).set_returning(),
    ];
    rows.extend(types.into_iter().map(CatalogRow::Type));

    rows.extend(BUILTIN_FUNCTIONS.iter().map(|(oid, name, args, result)| {
        CatalogRow::Function(Function::new(
            *oid,
            *name,
            PG_CATALOG_NAMESPACE,
            BOOTSTRAP_SUPERUSER,
            args.to_vec(),
            *result,
        ))
    }));

    rows
});
