//! Reply serializer: one in-flight reply per connection, strict FIFO.
//!
//! Workers finish in arbitrary order, but replies on one connection must
//! go out one at a time in submission order. Whichever caller finds the
//! queue idle becomes the temporary sole sender and drains everything
//! queued behind it; no dedicated sender task exists.

use std::net::SocketAddr;

use bytes::Bytes;
use tracing::{debug, warn};

use super::Connection;
use crate::metrics;

/// A reply waiting for the in-flight transmission to finish.
#[derive(Debug)]
pub(super) struct QueuedReply {
    payload: Bytes,
    peer: Option<SocketAddr>,
}

impl Connection {
    /// Queue a reply for transmission on this connection.
    ///
    /// Replies are transmitted strictly in the order `submit` was called.
    /// Transmission failures are logged and discarded, never retried. A
    /// reply for a connection that has been drained is dropped silently:
    /// the peer observes connection closure, not a partial reply.
    pub async fn submit(&self, payload: Bytes, peer: Option<SocketAddr>) {
        let next = {
            let mut flags = self.locked_flags();
            if flags.sending {
                flags.replies.push_back(QueuedReply { payload, peer });
                return;
            }
            flags.sending = true;
            QueuedReply { payload, peer }
        };
        self.drain_replies(next).await;
    }

    /// Transmit `next` and everything queued behind it, then clear
    /// `sending`. Runs outside the flags lock since transport I/O may
    /// block.
    async fn drain_replies(&self, mut next: QueuedReply) {
        loop {
            if self.is_valid() {
                match self.transport.send(next.payload, next.peer).await {
                    Ok(()) => metrics::inc_replies(),
                    Err(err) => {
                        warn!("connection {}: reply send failed: {err}", self.id);
                        metrics::inc_errors();
                    }
                }
            } else {
                debug!("connection {}: discarding reply after drain", self.id);
            }

            let mut flags = self.locked_flags();
            match flags.replies.pop_front() {
                Some(reply) => next = reply,
                None => {
                    flags.sending = false;
                    return;
                }
            }
        }
    }
}
