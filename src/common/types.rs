use serde::{Deserialize, Serialize};

/// Catalog object identifier, unique across the whole cluster
pub type Oid = u32;

/// The "no object" identifier
pub const INVALID_OID: Oid = 0;

/// First identifier handed out by the oid generator. Everything below is
/// reserved for bootstrap objects, which every node creates identically.
pub const FIRST_NORMAL_OID: Oid = 16384;

/// Maximum length of an object name (exclusive)
pub const NAME_DATA_LEN: usize = 64;

/// Transaction ID type (node-local)
pub type TxnId = u32;

/// Global transaction ID, shared by the coordinator and every worker for one command
pub type Gxid = u64;

/// Cluster node ID. The coordinator is always node 0.
pub type NodeId = u16;

/// Node ID of the coordinator
pub const COORDINATOR_NODE_ID: NodeId = 0;

/// Returns true if the identifier refers to an object
#[inline]
pub fn oid_is_valid(oid: Oid) -> bool {
    oid != INVALID_OID
}

/// Deletion policy for objects that have dependents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropBehavior {
    /// Refuse if anything depends on the object
    Restrict,
    /// Recursively remove dependents first
    Cascade,
}

impl Default for DropBehavior {
    fn default() -> Self {
        DropBehavior::Restrict
    }
}

impl std::fmt::Display for DropBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropBehavior::Restrict => write!(f, "RESTRICT"),
            DropBehavior::Cascade => write!(f, "CASCADE"),
        }
    }
}
