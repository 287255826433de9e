// Worker Transport
//
// How the coordinator reaches a worker. Every call carries its own deadline;
// a worker that does not answer in time is treated as failed.

use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use thiserror::Error;

use crate::catalog::{CatalogError, ErrorClass};
use crate::command::OidAssignment;
use crate::common::types::{Gxid, NodeId};
use super::node::ClusterNode;

/// Error type for coordinator-to-worker calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("worker {node} did not answer within {timeout:?}")]
    Timeout { node: NodeId, timeout: Duration },

    #[error("worker {0} is not reachable")]
    Disconnected(NodeId),

    #[error("worker {node} rejected the command: {message}")]
    Rejected {
        node: NodeId,
        message: String,
        /// The worker saw state that contradicts the coordinator's
        violation: bool,
    },

    #[error("worker {node} sent an unexpected reply: {reply}")]
    UnexpectedReply { node: NodeId, reply: String },
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, DispatchError>;

impl DispatchError {
    pub fn node(&self) -> NodeId {
        match self {
            DispatchError::Timeout { node, .. }
            | DispatchError::Rejected { node, .. }
            | DispatchError::UnexpectedReply { node, .. } => *node,
            DispatchError::Disconnected(node) => *node,
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, DispatchError::Rejected { violation: true, .. })
    }
}

impl From<DispatchError> for CatalogError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Rejected {
                node,
                message,
                violation: true,
            } => CatalogError::ProtocolViolation(format!("node {}: {}", node, message)),
            DispatchError::UnexpectedReply { node, reply } => {
                CatalogError::ProtocolViolation(format!("node {} replied {}", node, reply))
            }
            other => CatalogError::DispatchFailure {
                node: other.node(),
                reason: match other {
                    DispatchError::Rejected { message, .. } => message,
                    other => other.to_string(),
                },
            },
        }
    }
}

/// Requests a worker understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerRequest {
    /// Apply the framed command and hold its transaction open
    Prepare { gxid: Gxid, frame: Vec<u8> },
    CommitPrepared(Gxid),
    AbortPrepared(Gxid),
    Shutdown,
}

/// Worker replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerReply {
    /// Applied; these are the identifiers the worker ended up using
    Prepared(OidAssignment),
    Committed,
    /// `false` if nothing was prepared under the gxid
    Aborted(bool),
    Failed { message: String, violation: bool },
    Stopped,
}

/// The coordinator's handle on one worker
pub trait WorkerTransport: Send + Sync {
    fn node_id(&self) -> NodeId;

    fn prepare(&self, gxid: Gxid, frame: &[u8], timeout: Duration) -> Result<OidAssignment>;

    fn commit_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<()>;

    fn abort_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<()>;
}

struct WorkerCall {
    request: WorkerRequest,
    reply: Sender<WorkerReply>,
}

/// Transport to a worker thread in the same process
#[derive(Clone)]
pub struct ChannelTransport {
    node: NodeId,
    sender: Sender<WorkerCall>,
}

impl ChannelTransport {
    fn call(&self, request: WorkerRequest, timeout: Duration) -> Result<WorkerReply> {
        let (reply, replies) = channel::bounded(1);
        self.sender
            .send(WorkerCall { request, reply })
            .map_err(|_| DispatchError::Disconnected(self.node))?;
        replies.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => DispatchError::Timeout {
                node: self.node,
                timeout,
            },
            RecvTimeoutError::Disconnected => DispatchError::Disconnected(self.node),
        })
    }

    fn unexpected(&self, reply: WorkerReply) -> DispatchError {
        match reply {
            WorkerReply::Failed { message, violation } => DispatchError::Rejected {
                node: self.node,
                message,
                violation,
            },
            other => DispatchError::UnexpectedReply {
                node: self.node,
                reply: format!("{:?}", other),
            },
        }
    }

    /// Ask the worker thread to exit
    pub fn shutdown(&self, timeout: Duration) -> Result<()> {
        match self.call(WorkerRequest::Shutdown, timeout)? {
            WorkerReply::Stopped => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }
}

impl WorkerTransport for ChannelTransport {
    fn node_id(&self) -> NodeId {
        self.node
    }

    fn prepare(&self, gxid: Gxid, frame: &[u8], timeout: Duration) -> Result<OidAssignment> {
        let request = WorkerRequest::Prepare {
            gxid,
            frame: frame.to_vec(),
        };
        match self.call(request, timeout)? {
            WorkerReply::Prepared(assignment) => Ok(assignment),
            other => Err(self.unexpected(other)),
        }
    }

    fn commit_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<()> {
        match self.call(WorkerRequest::CommitPrepared(gxid), timeout)? {
            WorkerReply::Committed => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }

    fn abort_prepared(&self, gxid: Gxid, timeout: Duration) -> Result<()> {
        match self.call(WorkerRequest::AbortPrepared(gxid), timeout)? {
            WorkerReply::Aborted(_) => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }
}

fn failed(e: CatalogError) -> WorkerReply {
    WorkerReply::Failed {
        violation: e.class() == ErrorClass::ProtocolViolation,
        message: e.to_string(),
    }
}

fn serve(mut node: ClusterNode, calls: Receiver<WorkerCall>) {
    debug!("worker {} started", node.id());
    while let Ok(WorkerCall { request, reply }) = calls.recv() {
        let answer = match request {
            WorkerRequest::Prepare { gxid, frame } => match node.prepare(gxid, &frame) {
                Ok(outcome) => WorkerReply::Prepared(outcome.assignment),
                Err(e) => failed(e),
            },
            WorkerRequest::CommitPrepared(gxid) => match node.commit_prepared(gxid) {
                Ok(()) => WorkerReply::Committed,
                Err(e) => failed(e),
            },
            WorkerRequest::AbortPrepared(gxid) => match node.abort_prepared(gxid) {
                Ok(found) => WorkerReply::Aborted(found),
                Err(e) => failed(e),
            },
            WorkerRequest::Shutdown => {
                let _ = reply.send(WorkerReply::Stopped);
                break;
            }
        };
        // The coordinator may have given up waiting
        if reply.send(answer).is_err() {
            warn!("worker {}: reply dropped, coordinator stopped waiting", node.id());
        }
    }
    debug!("worker {} stopped", node.id());
}

/// Start a worker thread serving `node`
pub fn spawn_worker(node: ClusterNode) -> std::io::Result<(ChannelTransport, JoinHandle<()>)> {
    let (sender, calls) = channel::unbounded();
    let id = node.id();
    let handle = thread::Builder::new()
        .name(format!("catalog-worker-{}", id))
        .spawn(move || serve(node, calls))?;
    Ok((ChannelTransport { node: id, sender }, handle))
}
