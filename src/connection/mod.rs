//! Per-connection context: buffers, queues, flags, and the lifecycle gate.
//!
//! One [`Connection`] exists per accepted socket. Its reassembly state
//! lives behind the lifecycle gate so only one worker parses the stream at
//! a time; a small flags mutex lets the transport's notification path
//! record "more data ready" or "should disconnect" without contending on
//! slow reassembly; the reply queue shares that flags mutex. No code path
//! holds more than one of these locks at a time.

mod deferred;
mod lifecycle;
mod receive;
mod reply;

use std::{
    collections::VecDeque,
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError, atomic::AtomicBool},
};

use deferred::DeferredRecord;
use lifecycle::Gate;
pub use lifecycle::{AcquireError, StreamGuard};
use reply::QueuedReply;

use crate::{pool::ConnectionId, transport::Transport};

/// Edge-triggered flags and the reply queue, guarded by one small mutex.
///
/// The notification path sets `need_receive` and `should_disconnect` here
/// without touching the lifecycle gate; the reply serializer owns
/// `sending` and `replies`.
#[derive(Debug, Default)]
struct FlagState {
    need_receive: bool,
    should_disconnect: bool,
    sending: bool,
    replies: VecDeque<QueuedReply>,
}

/// Context for one accepted connection.
///
/// Created by [`WorkerPool::attach`](crate::pool::WorkerPool::attach) and
/// destroyed by the owning server once [`drain`](Connection::drain) has
/// returned and all in-flight work referencing it has finished. This layer
/// only observes validity; it never frees the connection itself.
pub struct Connection {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
    gate: Gate,
    flags: Mutex<FlagState>,
    deferred: Mutex<VecDeque<DeferredRecord>>,
    /// True while the connection sits in the pool's pending queue. Only
    /// mutated under the pool lock, preventing duplicate registration.
    pub(crate) queued_for_work: AtomicBool,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        transport: Arc<dyn Transport>,
        max_record_size: usize,
    ) -> Self {
        Self {
            id,
            transport,
            gate: Gate::new(max_record_size),
            flags: Mutex::new(FlagState::default()),
            deferred: Mutex::new(VecDeque::new()),
            queued_for_work: AtomicBool::new(false),
        }
    }

    /// Identifier assigned when the connection was attached to the pool.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.id }

    /// Whether the connection is still usable.
    ///
    /// Turns false exactly once, when draining begins.
    #[must_use]
    pub fn is_valid(&self) -> bool { self.gate.is_valid() }

    /// Whether a fatal framing or transport error has marked the
    /// connection for disconnection.
    ///
    /// The owning server polls this and reacts by draining and destroying
    /// the connection; this layer never tears sockets down itself.
    #[must_use]
    pub fn should_disconnect(&self) -> bool { self.locked_flags().should_disconnect }

    /// Mark the connection for disconnection.
    pub fn mark_disconnect(&self) { self.locked_flags().should_disconnect = true; }

    pub(crate) fn set_need_receive(&self) { self.locked_flags().need_receive = true; }

    pub(crate) fn take_need_receive(&self) -> bool {
        let mut flags = self.locked_flags();
        mem::take(&mut flags.need_receive)
    }

    fn locked_flags(&self) -> MutexGuard<'_, FlagState> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}
