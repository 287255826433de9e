// Command Outcome
//
// What a successful catalog command reports back to its caller.

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::common::types::Oid;
use super::allocator::OidAssignment;

/// Severity of a message attached to a successful command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Notice,
    Warning,
}

/// A non-fatal message produced while running a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Notice,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Notice => write!(f, "NOTICE:  {}", self.message),
            NoticeLevel::Warning => write!(f, "WARNING:  {}", self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// A new operator row was written, or a shell was completed
    Defined,
    OwnerChanged,
    /// The requested owner already owned the operator
    OwnerUnchanged,
    Removed,
    /// Missing-ok removal of an operator that does not exist
    Skipped,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandStatus::Defined => "DEFINE OPERATOR",
            CommandStatus::OwnerChanged | CommandStatus::OwnerUnchanged => "ALTER OPERATOR",
            CommandStatus::Removed | CommandStatus::Skipped => "REMOVE OPERATOR",
        };
        write!(f, "{}", s)
    }
}

/// Result of one command on one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub status: CommandStatus,
    /// Identifiers the command used, including any it allocated
    pub assignment: OidAssignment,
    /// New owner, for owner changes
    pub owner: Option<Oid>,
    pub notices: Vec<Notice>,
    /// Number of catalog changes made
    pub changes: usize,
}

impl CommandOutcome {
    pub fn new(status: CommandStatus, assignment: OidAssignment) -> Self {
        Self {
            status,
            assignment,
            owner: None,
            notices: Vec::new(),
            changes: 0,
        }
    }

    /// True if the command touched the catalog and must be replayed elsewhere
    pub fn changed(&self) -> bool {
        self.changes > 0
    }

    pub fn object(&self) -> Oid {
        self.assignment.operator
    }
}
