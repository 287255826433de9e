// Command Script Parser
//
// A small word-based syntax for driving the catalog commands from a shell or
// a script file, one command per line:
//
//   define <name> key=value ...
//   alter-owner <name> <left|none> <right|none> <role>
//   remove <name> <left|none> <right|none> [cascade] [if-exists]
//   set role <name>
//   set search_path <schema>[,<schema>...]
//   show [node]
//
// Values containing spaces are double-quoted, e.g. leftarg="setof int4".
// Everything after `#` is a comment.

use thiserror::Error;

use crate::common::types::{DropBehavior, NodeId};
use super::statement::{
    AlterOperatorOwnerStmt, CatalogStatement, DefArg, DefElem, DefineOperatorStmt, OperatorSignature, QualifiedName,
    RemoveOperatorStmt, TypeName,
};

/// Script parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Expected {0}")]
    Expected(&'static str),

    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("Unterminated quoted value")]
    UnterminatedQuote,

    #[error("Invalid node id: {0}")]
    InvalidNode(String),
}

pub type ParseResult<T> = std::result::Result<T, ScriptError>;

/// One parsed script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine {
    Statement(CatalogStatement),
    SetRole(String),
    SetSearchPath(Vec<String>),
    Show(Option<NodeId>),
    /// Blank or comment-only
    Empty,
}

fn tokenize(line: &str) -> ParseResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            '#' if !in_quotes => break,
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return Err(ScriptError::UnterminatedQuote);
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn operand(word: &str) -> Option<TypeName> {
    if word.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(TypeName::parse(word))
    }
}

fn signature(words: &mut std::vec::IntoIter<String>) -> ParseResult<OperatorSignature> {
    let name = words.next().ok_or(ScriptError::Expected("operator name"))?;
    let left = words.next().ok_or(ScriptError::Expected("left operand type or none"))?;
    let right = words.next().ok_or(ScriptError::Expected("right operand type or none"))?;
    Ok(OperatorSignature::new(QualifiedName::parse(&name), operand(&left), operand(&right)))
}

/// Parse one line of the command script syntax
pub fn parse_script_line(line: &str) -> ParseResult<ScriptLine> {
    let mut words = tokenize(line)?.into_iter();
    let Some(command) = words.next() else {
        return Ok(ScriptLine::Empty);
    };

    let parsed = match command.to_ascii_lowercase().as_str() {
        "define" => {
            let name = words.next().ok_or(ScriptError::Expected("operator name"))?;
            let definition = words
                .by_ref()
                .map(|word| match word.split_once('=') {
                    Some((key, value)) => DefElem::new(key, DefArg::Text(value.to_string())),
                    None => DefElem::flag(word),
                })
                .collect();
            ScriptLine::Statement(CatalogStatement::DefineOperator(DefineOperatorStmt {
                name: QualifiedName::parse(&name),
                definition,
            }))
        }
        "alter-owner" => {
            let operator = signature(&mut words)?;
            let new_owner = words.next().ok_or(ScriptError::Expected("new owner role"))?;
            ScriptLine::Statement(CatalogStatement::AlterOperatorOwner(AlterOperatorOwnerStmt { operator, new_owner }))
        }
        "remove" => {
            let operator = signature(&mut words)?;
            let mut stmt = RemoveOperatorStmt {
                operator,
                missing_ok: false,
                behavior: DropBehavior::Restrict,
            };
            for word in words.by_ref() {
                match word.to_ascii_lowercase().as_str() {
                    "cascade" => stmt.behavior = DropBehavior::Cascade,
                    "restrict" => stmt.behavior = DropBehavior::Restrict,
                    "if-exists" => stmt.missing_ok = true,
                    _ => return Err(ScriptError::UnexpectedArgument(word)),
                }
            }
            ScriptLine::Statement(CatalogStatement::RemoveOperator(stmt))
        }
        "set" => {
            let what = words.next().ok_or(ScriptError::Expected("role or search_path"))?;
            match what.to_ascii_lowercase().as_str() {
                "role" => ScriptLine::SetRole(words.next().ok_or(ScriptError::Expected("role name"))?),
                "search_path" => {
                    let path = words.next().ok_or(ScriptError::Expected("schema list"))?;
                    ScriptLine::SetSearchPath(
                        path.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
                    )
                }
                _ => return Err(ScriptError::UnexpectedArgument(what)),
            }
        }
        "show" => match words.next() {
            Some(node) => ScriptLine::Show(Some(node.parse().map_err(|_| ScriptError::InvalidNode(node))?)),
            None => ScriptLine::Show(None),
        },
        _ => return Err(ScriptError::UnknownCommand(command)),
    };

    if let Some(extra) = words.next() {
        return Err(ScriptError::UnexpectedArgument(extra));
    }
    Ok(parsed)
}
