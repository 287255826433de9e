use std::time::Duration;

use crate::common::types::{Oid, FIRST_NORMAL_OID};

/// Configuration for a catalog cluster
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of worker nodes next to the coordinator
    pub worker_count: usize,
    /// How long the coordinator waits for each worker reply
    pub dispatch_timeout: Duration,
    /// How long a transaction waits for a row lock held by a local
    /// transaction. On the coordinator the wait is extended, see
    /// [`ClusterConfig::coordinator_lock_timeout`].
    pub lock_timeout: Duration,
    /// First oid the coordinator's generator hands out
    pub first_normal_oid: Oid,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            dispatch_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(2),
            first_normal_oid: FIRST_NORMAL_OID,
        }
    }
}

impl ClusterConfig {
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Lock wait on the coordinator. A command keeps its locks until the
    /// cluster-wide decision, so a waiter must outlast the holder's prepare
    /// and commit (or abort) phases on top of the ordinary lock wait.
    pub fn coordinator_lock_timeout(&self) -> Duration {
        self.lock_timeout + self.dispatch_timeout * 2
    }
}
