//! Connection lifecycle gate.
//!
//! The gate provides exclusive access to one connection's reassembly and
//! record state while the transport's notification path stays non-blocking.
//! It is a slot-based asynchronous lock: acquiring takes the
//! [`ReassemblyBuffer`] out of the slot ("busy"), releasing puts it back.
//! `valid` transitions to false exactly once, when draining begins, and
//! every later acquisition fails.

use std::{
    ops::{Deref, DerefMut},
    sync::{Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tokio::sync::Notify;

use super::Connection;
use crate::reassembly::ReassemblyBuffer;

/// Errors returned by gate acquisition.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AcquireError {
    /// The connection has been drained; no acquisition can ever succeed.
    #[error("connection is no longer valid")]
    Invalid,
    /// Another holder owns the gate and the caller declined to wait.
    #[error("connection is busy")]
    WouldBlock,
}

#[derive(Debug)]
struct GateState {
    valid: bool,
    /// `None` while a holder owns the stream state.
    slot: Option<ReassemblyBuffer>,
}

#[derive(Debug)]
pub(super) struct Gate {
    state: Mutex<GateState>,
    notify: Notify,
}

impl Gate {
    pub(super) fn new(max_record_size: usize) -> Self {
        Self {
            state: Mutex::new(GateState {
                valid: true,
                slot: Some(ReassemblyBuffer::new(max_record_size)),
            }),
            notify: Notify::new(),
        }
    }

    pub(super) fn is_valid(&self) -> bool { self.locked().valid }

    fn locked(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on a connection's reassembly state.
///
/// Dropping the guard releases the gate and wakes any waiter, including a
/// drain in progress.
#[derive(Debug)]
pub struct StreamGuard<'a> {
    gate: &'a Gate,
    buffer: Option<ReassemblyBuffer>,
}

impl Deref for StreamGuard<'_> {
    type Target = ReassemblyBuffer;

    fn deref(&self) -> &Self::Target {
        self.buffer.as_ref().expect("guard holds the stream state")
    }
}

impl DerefMut for StreamGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buffer.as_mut().expect("guard holds the stream state")
    }
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.gate.locked().slot = Some(buffer);
            self.gate.notify.notify_waiters();
        }
    }
}

impl Connection {
    /// Acquire exclusive access to the reassembly state, waiting while
    /// another holder finishes.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Invalid`] if the connection has been
    /// drained; waiting acquisitions observe the drain and fail the same
    /// way.
    pub async fn acquire(&self) -> Result<StreamGuard<'_>, AcquireError> {
        loop {
            // The notified future must exist before the state check so a
            // release between check and await still wakes us.
            let notified = self.gate.notify.notified();
            {
                let mut state = self.gate.locked();
                if !state.valid {
                    return Err(AcquireError::Invalid);
                }
                if let Some(buffer) = state.slot.take() {
                    return Ok(StreamGuard {
                        gate: &self.gate,
                        buffer: Some(buffer),
                    });
                }
            }
            notified.await;
        }
    }

    /// Acquire the gate without waiting.
    ///
    /// Used by the transport's notification path, which must never stall
    /// behind a busy worker.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Invalid`] if the connection has been
    /// drained, or [`AcquireError::WouldBlock`] while another holder owns
    /// the gate.
    pub fn try_acquire(&self) -> Result<StreamGuard<'_>, AcquireError> {
        let mut state = self.gate.locked();
        if !state.valid {
            return Err(AcquireError::Invalid);
        }
        match state.slot.take() {
            Some(buffer) => Ok(StreamGuard {
                gate: &self.gate,
                buffer: Some(buffer),
            }),
            None => Err(AcquireError::WouldBlock),
        }
    }

    /// Invalidate the connection and wait for any busy holder to finish.
    ///
    /// Idempotent. After `drain` returns, no reassembly or parsing work is
    /// in flight and every subsequent [`acquire`](Connection::acquire)
    /// fails. Records already queued are not discarded here; that is the
    /// owning layer's responsibility.
    pub async fn drain(&self) {
        loop {
            let notified = self.gate.notify.notified();
            {
                let mut state = self.gate.locked();
                state.valid = false;
                if state.slot.is_some() {
                    return;
                }
            }
            notified.await;
        }
    }
}
