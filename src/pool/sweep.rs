//! Deadline sweep over deferred work.
//!
//! Deliberately delayed requests must not be delayed indefinitely. The
//! owning server calls [`WorkerPool::sweep_deferred`] on a regular
//! interval of its choosing; each tick inspects only the head of every
//! live connection's deferred list and forces scheduling where the
//! deadline has passed.

use std::time::Instant;

use super::WorkerPool;

impl WorkerPool {
    /// Re-examine deferred-work deadlines and wake expired connections.
    ///
    /// A connection is woken at most once per tick regardless of how many
    /// of its deferrals expired, preserving the scheduler's
    /// no-double-enqueue invariant. Returns `true` while any live
    /// connection still holds unexpired deferred work, so the driver can
    /// decide whether to keep ticking; records parked behind an expired
    /// head count as outstanding until a worker claims them.
    pub fn sweep_deferred(&self, now: Instant) -> bool {
        let mut unexpired = false;
        for conn in self.registry.live() {
            if !conn.is_valid() {
                continue;
            }
            match conn.head_deferred_deadline() {
                Some(deadline) if deadline <= now => {
                    // Length read before the wake: a woken worker may
                    // start claiming entries immediately.
                    if conn.deferred_len() > 1 {
                        unexpired = true;
                    }
                    self.try_wake(&conn);
                }
                Some(_) => unexpired = true,
                None => {}
            }
        }
        unexpired
    }
}
