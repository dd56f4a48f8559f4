//! Fixed-size pool of shared workers.

use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Worker, WorkerHandle};
use crate::connection::ConnectionId;

/// Index of the worker serving `connection_id` in a pool of `pool_size`.
///
/// The mapping depends only on the id, never on arrival order.
///
/// ```
/// use eventwire::worker::worker_index;
///
/// assert_eq!(worker_index(7, 3), 1);
/// assert_eq!(worker_index(9, 3), 0);
/// ```
#[must_use]
pub fn worker_index(connection_id: u64, pool_size: usize) -> usize {
    let size = pool_size.max(1) as u64;
    // Always below `pool_size`, so it fits in `usize`.
    (connection_id % size) as usize
}

/// Workers created at server start and shared by all connections.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one), each with `queue_size` slots.
    #[must_use]
    pub fn spawn(
        size: usize,
        queue_size: usize,
        parent: &CancellationToken,
        tracker: &TaskTracker,
    ) -> Self {
        let workers = (0..size.max(1) as u64)
            .map(|id| Worker::spawn(id, queue_size, parent, tracker))
            .collect();
        Self { workers }
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize { self.workers.len() }

    /// Always `false`; a pool has at least one worker.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.workers.is_empty() }

    /// Handle of the worker that serves `id`.
    #[must_use]
    pub fn assign(&self, id: ConnectionId) -> WorkerHandle {
        self.workers[worker_index(id.as_u64(), self.workers.len())].handle()
    }

    /// Stop every worker. Running chains finish first.
    pub fn stop(&self) {
        for worker in &self.workers {
            worker.stop();
        }
    }
}
