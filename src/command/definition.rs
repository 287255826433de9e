// Operator Definition Parsing
//
// Turns the attribute list of a define command into an OperatorDefinition.
// Unknown attributes only warn; a missing procedure is an error.

use log::warn;

use crate::catalog::{CatalogError, CatalogResult};
use crate::common::types::NAME_DATA_LEN;
use super::statement::{DefArg, DefElem, QualifiedName, TypeName};

/// Characters an operator name may be built from
const OPERATOR_CHARS: &str = "+-*/<>=~!@#%^&|`?";

/// A multi-character name ending in `+` or `-` needs one of these
const OPERATOR_SPECIAL_CHARS: &str = "~!@#%^&|`?";

/// The attributes of a define command, before name resolution
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperatorDefinition {
    pub left: Option<TypeName>,
    pub right: Option<TypeName>,
    pub procedure: Option<QualifiedName>,
    pub commutator: Option<QualifiedName>,
    pub negator: Option<QualifiedName>,
    pub restrict: Option<QualifiedName>,
    pub join: Option<QualifiedName>,
    pub hashes: bool,
    pub merges: bool,
    /// Attributes that were not recognized
    pub ignored: Vec<String>,
}

impl OperatorDefinition {
    pub fn is_binary(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    /// The procedure, which every definition must name
    pub fn procedure(&self) -> CatalogResult<&QualifiedName> {
        self.procedure
            .as_ref()
            .ok_or_else(|| CatalogError::InvalidDefinition("operator procedure must be specified".to_string()))
    }
}

fn def_type(elem: &DefElem) -> CatalogResult<TypeName> {
    match &elem.arg {
        Some(DefArg::Type(t)) => Ok(t.clone()),
        Some(DefArg::Name(n)) => Ok(TypeName {
            name: n.clone(),
            setof: false,
        }),
        Some(DefArg::Text(s)) if !s.trim().is_empty() => Ok(TypeName::parse(s)),
        _ => Err(CatalogError::InvalidDefinition(format!("{} requires a type name", elem.name))),
    }
}

fn def_name(elem: &DefElem) -> CatalogResult<QualifiedName> {
    match &elem.arg {
        Some(DefArg::Name(n)) => Ok(n.clone()),
        Some(DefArg::Type(t)) if !t.setof => Ok(t.name.clone()),
        Some(DefArg::Text(s)) if !s.trim().is_empty() => Ok(QualifiedName::parse(s.trim())),
        _ => Err(CatalogError::InvalidDefinition(format!("{} requires a name", elem.name))),
    }
}

/// A missing value means true
fn def_bool(elem: &DefElem) -> CatalogResult<bool> {
    match &elem.arg {
        None => Ok(true),
        Some(DefArg::Bool(b)) => Ok(*b),
        Some(DefArg::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(true),
            "false" | "off" | "no" | "0" => Ok(false),
            _ => Err(CatalogError::InvalidDefinition(format!("{} requires a Boolean value", elem.name))),
        },
        Some(_) => Err(CatalogError::InvalidDefinition(format!("{} requires a Boolean value", elem.name))),
    }
}

/// Interpret the attribute list of a define command
pub fn parse_operator_definition(elems: &[DefElem]) -> CatalogResult<OperatorDefinition> {
    let mut def = OperatorDefinition::default();

    for elem in elems {
        match elem.name.to_ascii_lowercase().as_str() {
            "leftarg" => {
                def.left = Some(def_type(elem)?);
            }
            "rightarg" => {
                def.right = Some(def_type(elem)?);
            }
            "procedure" => def.procedure = Some(def_name(elem)?),
            "commutator" => def.commutator = Some(def_name(elem)?),
            "negator" => def.negator = Some(def_name(elem)?),
            "restrict" => def.restrict = Some(def_name(elem)?),
            "join" => def.join = Some(def_name(elem)?),
            "hashes" => def.hashes = def_bool(elem)?,
            "merges" => def.merges = def_bool(elem)?,
            // Obsolete merge-join options; naming any of them implies merges
            "sort1" | "sort2" | "ltcmp" | "gtcmp" => def.merges = true,
            other => {
                warn!("operator attribute \"{}\" not recognized", other);
                def.ignored.push(elem.name.clone());
            }
        }
    }

    for operand in [&def.left, &def.right].into_iter().flatten() {
        if operand.setof {
            return Err(CatalogError::InvalidDefinition(
                "SETOF type not allowed for operator argument".to_string(),
            ));
        }
    }
    if def.left.is_none() && def.right.is_none() {
        return Err(CatalogError::InvalidDefinition(
            "at least one of leftarg or rightarg must be specified".to_string(),
        ));
    }
    def.procedure()?;

    if !def.is_binary() {
        let binary_only = [
            (def.commutator.is_some(), "only binary operators can have commutators"),
            (def.join.is_some(), "only binary operators can have join selectivity"),
            (def.merges, "only binary operators can merge join"),
            (def.hashes, "only binary operators can hash"),
        ];
        if let Some((_, message)) = binary_only.iter().find(|(set, _)| *set) {
            return Err(CatalogError::InvalidDefinition(message.to_string()));
        }
    }

    Ok(def)
}

/// Check that `name` is a legal operator name
pub fn validate_operator_name(name: &str) -> CatalogResult<()> {
    let invalid = |why: &str| Err(CatalogError::InvalidDefinition(format!("operator name \"{}\" {}", name, why)));

    if name.is_empty() {
        return invalid("is empty");
    }
    if name.len() >= NAME_DATA_LEN {
        return invalid("is too long");
    }
    if let Some(c) = name.chars().find(|c| !OPERATOR_CHARS.contains(*c)) {
        return invalid(&format!("contains invalid character '{}'", c));
    }
    if name.contains("--") || name.contains("/*") {
        return invalid("cannot contain a comment start");
    }
    if name.len() > 1 && (name.ends_with('+') || name.ends_with('-')) {
        if !name.chars().any(|c| OPERATOR_SPECIAL_CHARS.contains(c)) {
            return invalid("cannot end in + or - unless it contains one of ~ ! @ # % ^ & | ` ?");
        }
    }
    Ok(())
}
