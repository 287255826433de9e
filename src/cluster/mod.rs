//! Cluster Module
//!
//! Coordinator-to-worker replication of catalog commands: the dispatch
//! payload and its wire frame, the worker transport, worker nodes, the
//! two-phase dispatch coordinator and an in-process cluster.

pub mod config;
pub mod dispatch;
pub mod local;
pub mod node;
pub mod pending;
pub mod transport;

// Re-export key types
pub use self::config::ClusterConfig;
pub use self::dispatch::{DispatchCoordinator, DispatchOutcome, DispatchState};
pub use self::local::{LocalCluster, LocalClusterBuilder};
pub use self::node::ClusterNode;
pub use self::pending::{CodecError, DispatchEnvelope, PendingCommand};
pub use self::transport::{spawn_worker, ChannelTransport, DispatchError, WorkerReply, WorkerRequest, WorkerTransport};
