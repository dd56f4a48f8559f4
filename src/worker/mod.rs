//! Ordered execution of handler chains.
//!
//! A [`Worker`] owns a bounded queue of [`Context`]s and a task that runs each
//! chain to completion before taking the next one. Every connection is bound
//! to exactly one worker for its whole life, so requests from one connection
//! are handled in arrival order whether the worker is dedicated to it or
//! shared through a [`WorkerPool`].

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error};

use crate::{context::Context, metrics, panic::format_panic};

mod pool;

pub use pool::{WorkerPool, worker_index};

/// The target worker no longer accepts tasks.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("worker {0} has stopped")]
pub struct WorkerStopped(pub u64);

/// Cloneable submission side of a worker queue.
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    id: u64,
    tasks: mpsc::Sender<Context>,
}

impl WorkerHandle {
    /// Identifier of the worker behind this handle.
    #[must_use]
    pub fn id(&self) -> u64 { self.id }

    /// Queue `task`, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerStopped`] if the worker has shut down.
    pub async fn submit(&self, task: Context) -> Result<(), WorkerStopped> {
        self.tasks.send(task).await.map_err(|_| WorkerStopped(self.id))
    }

    /// Handle with no worker task behind it; the receiver sees every
    /// submitted context.
    #[cfg(test)]
    pub(crate) fn detached(id: u64, queue_size: usize) -> (Self, mpsc::Receiver<Context>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (Self { id, tasks: tx }, rx)
    }
}

/// A single task executor with its own bounded queue.
#[derive(Debug)]
pub struct Worker {
    handle: WorkerHandle,
    token: CancellationToken,
}

impl Worker {
    /// Spawn a worker on `tracker` with room for `queue_size` pending tasks.
    ///
    /// The worker stops when [`Worker::stop`] is called or `parent` is
    /// cancelled.
    #[must_use]
    pub fn spawn(
        id: u64,
        queue_size: usize,
        parent: &CancellationToken,
        tracker: &TaskTracker,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let token = parent.child_token();
        tracker.spawn(run(id, rx, token.clone()));
        debug!(worker_id = id, "worker started");
        Self {
            handle: WorkerHandle { id, tasks: tx },
            token,
        }
    }

    /// Identifier of this worker.
    #[must_use]
    pub fn id(&self) -> u64 { self.handle.id }

    /// Submission handle for this worker.
    #[must_use]
    pub fn handle(&self) -> WorkerHandle { self.handle.clone() }

    /// Stop taking tasks. A chain already running is allowed to finish;
    /// queued tasks are dropped.
    pub fn stop(&self) { self.token.cancel(); }

    /// Returns `true` once [`Worker::stop`] was called or the parent token was
    /// cancelled.
    #[must_use]
    pub fn is_stopped(&self) -> bool { self.token.is_cancelled() }
}

/// How a connection reaches its worker.
#[derive(Debug)]
pub enum WorkerBinding {
    /// The connection owns the worker and stops it on close.
    Dedicated(Worker),
    /// The worker belongs to the server pool.
    Pooled(WorkerHandle),
}

impl WorkerBinding {
    /// Identifier of the bound worker.
    #[must_use]
    pub fn worker_id(&self) -> u64 {
        match self {
            Self::Dedicated(worker) => worker.id(),
            Self::Pooled(handle) => handle.id(),
        }
    }

    /// Returns `true` when the worker is owned by the connection.
    #[must_use]
    pub fn is_dedicated(&self) -> bool { matches!(self, Self::Dedicated(_)) }

    /// Queue `task` on the bound worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerStopped`] if the worker has shut down.
    pub async fn submit(&self, task: Context) -> Result<(), WorkerStopped> {
        match self {
            Self::Dedicated(worker) => worker.handle.submit(task).await,
            Self::Pooled(handle) => handle.submit(task).await,
        }
    }

    /// Stop a dedicated worker; pooled workers are left running.
    pub(crate) fn release(&self) {
        if let Self::Dedicated(worker) = self {
            worker.stop();
        }
    }
}

async fn run(id: u64, mut rx: mpsc::Receiver<Context>, token: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            () = token.cancelled() => break,
            task = rx.recv() => match task {
                Some(ctx) => execute(id, ctx).await,
                None => break,
            },
        }
    }
    rx.close();
    debug!(worker_id = id, "worker stopped");
}

/// Run one chain, isolating the worker from panics raised inside it.
async fn execute(id: u64, mut ctx: Context) {
    let connection_id = ctx.connection().id();
    let event = ctx.request().event();
    let chain = AssertUnwindSafe(async move { ctx.next().await }).catch_unwind();
    if let Err(panic) = chain.await {
        metrics::inc_handler_panics();
        let panic_msg = format_panic(panic);
        error!(
            worker_id = id,
            %connection_id,
            event,
            panic = %panic_msg,
            "handler chain panicked"
        );
    }
}
