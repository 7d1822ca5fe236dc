//! Deferred records awaiting a wake deadline.
//!
//! A handler may legitimately delay a request's completion, for example to
//! coalesce related writes. The record parks here with a deadline; the
//! pool's deadline sweep inspects only the head of the list (insertion
//! order approximates deadline order, and the head is a cheap bound) and
//! forces scheduling once it expires. A worker holding the lifecycle gate
//! then moves every expired record back onto the pending queue.

use std::{
    sync::{MutexGuard, PoisonError},
    time::Instant,
};

use super::Connection;
use crate::{framing::Record, reassembly::ReassemblyBuffer};

/// A record parked until its wake deadline.
#[derive(Debug)]
pub(super) struct DeferredRecord {
    record: Record,
    wake_at: Instant,
}

impl Connection {
    /// Park a record for re-delivery at `wake_at`.
    pub(crate) fn defer(&self, record: Record, wake_at: Instant) {
        self.locked_deferred()
            .push_back(DeferredRecord { record, wake_at });
    }

    /// Deadline of the oldest deferred record, if any.
    pub(crate) fn head_deferred_deadline(&self) -> Option<Instant> {
        self.locked_deferred().front().map(|entry| entry.wake_at)
    }

    /// Move every expired deferred record back onto the pending queue.
    ///
    /// Called by a worker holding the lifecycle gate, so re-queued records
    /// flow through the normal decode/execute path. Returns the number of
    /// records claimed.
    pub(crate) fn claim_expired_deferred(
        &self,
        buffer: &mut ReassemblyBuffer,
        now: Instant,
    ) -> usize {
        let mut claimed = 0;
        let mut deferred = self.locked_deferred();
        while deferred.front().is_some_and(|entry| entry.wake_at <= now) {
            if let Some(entry) = deferred.pop_front() {
                buffer.requeue(entry.record);
                claimed += 1;
            }
        }
        claimed
    }

    /// Number of records currently parked.
    #[must_use]
    pub fn deferred_len(&self) -> usize { self.locked_deferred().len() }

    fn locked_deferred(
        &self,
    ) -> MutexGuard<'_, std::collections::VecDeque<DeferredRecord>> {
        self.deferred.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
