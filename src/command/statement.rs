// Catalog Command Statements
//
// Parsed, unresolved input of the operator commands. Names in here are plain
// strings; the resolver turns them into identifiers.

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::common::types::{DropBehavior, Oid};

/// A possibly schema-qualified object name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Split `schema.name` at the first dot. Operator names never contain one.
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Self::qualified(schema, name)
            }
            _ => Self::new(text),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A reference to a type, as written
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeName {
    pub name: QualifiedName,
    /// Written as `SETOF name`
    pub setof: bool,
}

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: QualifiedName::new(name),
            setof: false,
        }
    }

    pub fn setof(mut self) -> Self {
        self.setof = true;
        self
    }

    /// Parse `[setof ]name`
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let lowered = text.to_ascii_lowercase();
        match lowered.strip_prefix("setof ") {
            Some(_) => Self {
                name: QualifiedName::parse(text[6..].trim()),
                setof: true,
            },
            None => Self {
                name: QualifiedName::parse(text),
                setof: false,
            },
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.setof {
            write!(f, "setof ")?;
        }
        write!(f, "{}", self.name)
    }
}

/// Value of one definition attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefArg {
    Type(TypeName),
    Name(QualifiedName),
    Bool(bool),
    /// Uninterpreted text; converted according to the attribute it belongs to
    Text(String),
}

impl fmt::Display for DefArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefArg::Type(t) => write!(f, "{}", t),
            DefArg::Name(n) => write!(f, "{}", n),
            DefArg::Bool(b) => write!(f, "{}", b),
            DefArg::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One `name = value` attribute of a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefElem {
    pub name: String,
    pub arg: Option<DefArg>,
}

impl DefElem {
    pub fn new(name: impl Into<String>, arg: DefArg) -> Self {
        Self {
            name: name.into(),
            arg: Some(arg),
        }
    }

    /// An attribute given without a value, e.g. a bare `hashes`
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: None,
        }
    }
}

/// Operator name plus operand types, identifying one operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSignature {
    pub name: QualifiedName,
    pub left: Option<TypeName>,
    pub right: Option<TypeName>,
}

impl OperatorSignature {
    pub fn new(name: QualifiedName, left: Option<TypeName>, right: Option<TypeName>) -> Self {
        Self { name, left, right }
    }
}

impl fmt::Display for OperatorSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operand = |t: &Option<TypeName>| match t {
            Some(t) => t.to_string(),
            None => "NONE".to_string(),
        };
        write!(f, "{}({},{})", self.name, operand(&self.left), operand(&self.right))
    }
}

/// Define (or complete) an operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineOperatorStmt {
    pub name: QualifiedName,
    pub definition: Vec<DefElem>,
}

/// Give an operator a new owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterOperatorOwnerStmt {
    pub operator: OperatorSignature,
    pub new_owner: String,
}

/// Remove an operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOperatorStmt {
    pub operator: OperatorSignature,
    /// Succeed with a notice if the operator does not exist
    pub missing_ok: bool,
    pub behavior: DropBehavior,
}

/// Any statement the catalog command layer executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogStatement {
    DefineOperator(DefineOperatorStmt),
    AlterOperatorOwner(AlterOperatorOwnerStmt),
    RemoveOperator(RemoveOperatorStmt),
}

impl CatalogStatement {
    /// Command tag, for logs and results
    pub fn tag(&self) -> &'static str {
        match self {
            CatalogStatement::DefineOperator(_) => "DEFINE OPERATOR",
            CatalogStatement::AlterOperatorOwner(_) => "ALTER OPERATOR OWNER",
            CatalogStatement::RemoveOperator(_) => "REMOVE OPERATOR",
        }
    }
}

/// Who is running a command, and where unqualified names are looked up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: Oid,
    pub search_path: Vec<String>,
}

impl Session {
    /// A session with the default search path (`public`)
    pub fn new(user: Oid) -> Self {
        Self {
            user,
            search_path: vec!["public".to_string()],
        }
    }

    pub fn with_search_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_path = path.into_iter().map(Into::into).collect();
        self
    }
}
