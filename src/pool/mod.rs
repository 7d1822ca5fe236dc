//! Worker pool: matching a bounded set of workers to connections with work.
//!
//! The pool keeps an idle-worker free list and a pending-connection queue
//! behind one pool-wide lock, distinct from every per-connection lock.
//! Waking a connection hands it directly to an idle worker when one
//! exists, bypassing the queue; otherwise the connection is enqueued at
//! most once. This two-path handoff keeps latency low while workers are
//! plentiful and makes backlog explicit (bounded by connection count) when
//! they are saturated — workers are never busy-polled.

mod registry;
mod sweep;
mod worker;

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

pub use registry::ConnectionId;
use registry::Registry;
use tokio::sync::oneshot;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

use crate::{
    connection::Connection,
    framing::DEFAULT_MAX_RECORD_SIZE,
    handler::RequestHandler,
    metrics,
    transport::Transport,
};

/// Tunables fixed at pool construction.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    /// Number of worker tasks.
    pub workers: usize,
    /// Ceiling on the size of a reassembled record, per connection.
    pub max_record_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
        }
    }
}

/// Builder for [`WorkerPool`].
#[derive(Debug, Default)]
pub struct WorkerPoolBuilder {
    config: PoolConfig,
}

impl WorkerPoolBuilder {
    /// Set the number of worker tasks.
    #[must_use]
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count.max(1);
        self
    }

    /// Set the per-connection record size ceiling.
    #[must_use]
    pub fn max_record_size(mut self, bytes: usize) -> Self {
        self.config.max_record_size = bytes;
        self
    }

    /// Construct the pool. Workers are spawned by
    /// [`WorkerPool::start`].
    #[must_use]
    pub fn build(self) -> Arc<WorkerPool> {
        Arc::new(WorkerPool {
            config: self.config,
            state: Mutex::new(PoolState::default()),
            registry: Registry::default(),
            next_id: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }
}

/// Idle list and pending queue, guarded by the pool lock.
#[derive(Default)]
struct PoolState {
    /// Workers waiting for a direct handoff, most recently parked last.
    idle: Vec<oneshot::Sender<Arc<Connection>>>,
    /// Connections with work but no free worker, strict FIFO.
    pending: VecDeque<Arc<Connection>>,
}

/// Global worker pool shared by every connection of the server.
///
/// Constructed once at server start and passed by handle; never ambient
/// global state.
pub struct WorkerPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
    registry: Registry,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Start building a pool.
    #[must_use]
    pub fn builder() -> WorkerPoolBuilder { WorkerPoolBuilder::default() }

    /// Spawn the configured number of worker tasks.
    pub fn start<H: RequestHandler>(self: &Arc<Self>, handler: Arc<H>) {
        for worker_id in 0..self.config.workers {
            let pool = Arc::clone(self);
            let handler = Arc::clone(&handler);
            self.tracker
                .spawn(worker::worker_loop(pool, handler, worker_id));
        }
    }

    /// Create a connection context for a freshly accepted socket and
    /// register it with the pool.
    pub fn attach(&self, transport: Arc<dyn Transport>) -> Arc<Connection> {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let conn = Arc::new(Connection::new(id, transport, self.config.max_record_size));
        self.registry.insert(&conn);
        metrics::inc_connections();
        info!("connection {id} attached");
        conn
    }

    /// Drain a connection and remove it from the registry.
    ///
    /// Returns once no worker holds the connection's lifecycle gate; the
    /// owning server may then destroy the socket. Queued records and
    /// replies are dropped with the connection, not transmitted.
    pub async fn detach(&self, conn: &Arc<Connection>) {
        conn.drain().await;
        self.registry.remove(conn.id());
        metrics::dec_connections();
        info!("connection {} detached", conn.id());
    }

    /// Schedule a connection that has (or may have) work.
    ///
    /// If an idle worker exists the connection is handed to it directly,
    /// bypassing the pending queue; otherwise it is enqueued unless it is
    /// already queued. Calling `try_wake` repeatedly for the same
    /// connection is safe: duplicate registrations are suppressed so two
    /// workers can never reassemble one connection concurrently.
    pub fn try_wake(&self, conn: &Arc<Connection>) {
        if !conn.is_valid() {
            return;
        }
        let mut state = self.locked();
        while let Some(idle) = state.idle.pop() {
            match idle.send(Arc::clone(conn)) {
                Ok(()) => return,
                // The worker stopped waiting (shutdown race); try the next.
                Err(_) => continue,
            }
        }
        if !conn.queued_for_work.swap(true, Ordering::AcqRel) {
            state.pending.push_back(Arc::clone(conn));
        }
    }

    /// Number of connections waiting in the pending queue.
    #[must_use]
    pub fn backlog_len(&self) -> usize { self.locked().pending.len() }

    /// Stop accepting work and wait for every worker task to exit.
    ///
    /// Workers finish the connection they currently hold; pending
    /// connections are dropped from the queue.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        {
            let mut state = self.locked();
            state.idle.clear();
            for conn in state.pending.drain(..) {
                conn.queued_for_work.store(false, Ordering::Release);
            }
        }
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Next connection for a worker: pending backlog first, otherwise park
    /// on the idle list and wait for a direct handoff. Returns `None` on
    /// shutdown.
    pub(crate) async fn next_connection(&self) -> Option<Arc<Connection>> {
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }
            let handoff = {
                let mut state = self.locked();
                if let Some(conn) = state.pending.pop_front() {
                    conn.queued_for_work.store(false, Ordering::Release);
                    return Some(conn);
                }
                let (tx, rx) = oneshot::channel();
                state.idle.push(tx);
                rx
            };
            tokio::select! {
                () = self.shutdown.cancelled() => return None,
                res = handoff => {
                    if let Ok(conn) = res {
                        return Some(conn);
                    }
                    // Sender dropped during shutdown cleanup; re-check.
                }
            }
        }
    }

    fn locked(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
