//! Catalog Command Module
//!
//! The resolve / authorize / allocate / mutate / track pipeline behind the
//! operator commands, shared by coordinator and worker nodes.

pub mod allocator;
pub mod definition;
pub mod dependency;
pub mod mutator;
pub mod operator;
pub mod outcome;
pub mod permission;
pub mod resolver;
pub mod script;
pub mod statement;

// Re-export key types
pub use self::allocator::{IdentifierAllocator, IdentifierPlan, OidAssignment, OidGenerator, PipelineMode, SequentialOidGenerator};
pub use self::dependency::DependencyTracker;
pub use self::mutator::CatalogMutator;
pub use self::operator::OperatorCommand;
pub use self::outcome::{CommandOutcome, CommandStatus, Notice, NoticeLevel};
pub use self::permission::PermissionGuard;
pub use self::resolver::NameResolver;
pub use self::script::{parse_script_line, ScriptError, ScriptLine};
pub use self::statement::{
    AlterOperatorOwnerStmt, CatalogStatement, DefArg, DefElem, DefineOperatorStmt, OperatorSignature, QualifiedName,
    RemoveOperatorStmt, Session, TypeName,
};
