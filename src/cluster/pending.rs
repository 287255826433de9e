// Dispatch Payload
//
// What the coordinator sends a worker for one command: the original
// statement plus every identifier the coordinator decided, so a worker never
// allocates or looks up anything the coordinator did not already fix.
//
// Frame layout (little-endian):
//   magic   u32  "CATD"
//   version u16
//   length  u32  bincode body length
//   body    [u8; length]

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::command::{
    AlterOperatorOwnerStmt, CatalogStatement, CommandOutcome, DefineOperatorStmt, OidAssignment, RemoveOperatorStmt,
    Session,
};
use crate::common::types::{Gxid, Oid};

/// Error type for dispatch frame encoding and decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to serialize dispatch envelope: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize dispatch envelope: {0}")]
    DeserializationError(String),

    #[error("Bad frame magic {0:#010x}")]
    BadMagic(u32),

    #[error("Unsupported frame version {0}")]
    UnsupportedVersion(u16),

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

impl From<CodecError> for CatalogError {
    fn from(e: CodecError) -> Self {
        CatalogError::Codec(e.to_string())
    }
}

/// Magic number for dispatch frames: "CATD" in ASCII
pub const FRAME_MAGIC: u32 = 0x4341_5444;

/// Current frame format version
pub const FRAME_VERSION: u16 = 1;

/// Size of the frame header in bytes
pub const FRAME_HEADER_SIZE: usize = 10;

/// A command as replayed on a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingCommand {
    DefineOperator {
        statement: DefineOperatorStmt,
        assignment: OidAssignment,
    },
    AlterOperatorOwner {
        statement: AlterOperatorOwnerStmt,
        operator: Oid,
        new_owner: Oid,
    },
    RemoveOperator {
        statement: RemoveOperatorStmt,
        operator: Oid,
    },
}

impl PendingCommand {
    /// Build the payload from what the coordinator's pipeline decided
    pub fn from_outcome(statement: &CatalogStatement, outcome: &CommandOutcome) -> std::result::Result<Self, CatalogError> {
        let pending = match statement {
            CatalogStatement::DefineOperator(stmt) => PendingCommand::DefineOperator {
                statement: stmt.clone(),
                assignment: outcome.assignment,
            },
            CatalogStatement::AlterOperatorOwner(stmt) => PendingCommand::AlterOperatorOwner {
                statement: stmt.clone(),
                operator: outcome.object(),
                new_owner: outcome
                    .owner
                    .ok_or_else(|| CatalogError::Internal("owner change without a resolved owner".to_string()))?,
            },
            CatalogStatement::RemoveOperator(stmt) => PendingCommand::RemoveOperator {
                statement: stmt.clone(),
                operator: outcome.object(),
            },
        };
        Ok(pending)
    }

    pub fn statement(&self) -> CatalogStatement {
        match self {
            PendingCommand::DefineOperator { statement, .. } => CatalogStatement::DefineOperator(statement.clone()),
            PendingCommand::AlterOperatorOwner { statement, .. } => {
                CatalogStatement::AlterOperatorOwner(statement.clone())
            }
            PendingCommand::RemoveOperator { statement, .. } => CatalogStatement::RemoveOperator(statement.clone()),
        }
    }

    /// Identifiers the worker must use
    pub fn assignment(&self) -> OidAssignment {
        match self {
            PendingCommand::DefineOperator { assignment, .. } => *assignment,
            PendingCommand::AlterOperatorOwner { operator, .. } | PendingCommand::RemoveOperator { operator, .. } => {
                OidAssignment::for_operator(*operator)
            }
        }
    }
}

/// One dispatched command, tagged with its global transaction id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    pub gxid: Gxid,
    pub session: Session,
    pub command: PendingCommand,
}

impl DispatchEnvelope {
    /// Encode into a framed byte buffer
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self).map_err(|e| CodecError::SerializationError(e.to_string()))?;
        let mut frame = vec![0u8; FRAME_HEADER_SIZE + body.len()];
        LittleEndian::write_u32(&mut frame[0..4], FRAME_MAGIC);
        LittleEndian::write_u16(&mut frame[4..6], FRAME_VERSION);
        LittleEndian::write_u32(&mut frame[6..10], body.len() as u32);
        frame[FRAME_HEADER_SIZE..].copy_from_slice(&body);
        Ok(frame)
    }

    /// Decode a framed byte buffer, validating the header first
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(CodecError::Truncated {
                expected: FRAME_HEADER_SIZE,
                actual: frame.len(),
            });
        }
        let magic = LittleEndian::read_u32(&frame[0..4]);
        if magic != FRAME_MAGIC {
            return Err(CodecError::BadMagic(magic));
        }
        let version = LittleEndian::read_u16(&frame[4..6]);
        if version != FRAME_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let length = LittleEndian::read_u32(&frame[6..10]) as usize;
        let body = &frame[FRAME_HEADER_SIZE..];
        if body.len() != length {
            return Err(CodecError::Truncated {
                expected: FRAME_HEADER_SIZE + length,
                actual: frame.len(),
            });
        }
        bincode::deserialize(body).map_err(|e| CodecError::DeserializationError(e.to_string()))
    }
}
