//! Receive path: transport deliveries into the reassembly buffer.
//!
//! [`Connection::data_ready`] is the transport's asynchronous notification
//! entry point. It never blocks on the lifecycle gate: when a worker holds
//! the gate, the path records `need_receive` and leaves the pull to that
//! worker, which re-checks the flag before releasing.

use log::{debug, warn};

use super::{Connection, lifecycle::AcquireError};
use crate::{
    metrics,
    pool::WorkerPool,
    reassembly::ReassemblyBuffer,
    transport::{Delivery, TransportError},
};

impl Connection {
    /// React to the transport's "more data ready" notification.
    ///
    /// Pulls deliveries into the reassembly buffer if the gate is free and
    /// wakes the pool when complete records were produced. When the gate
    /// is busy the pull is delegated to the current holder via the
    /// `need_receive` flag and the pool is still nudged so a worker
    /// returns to the connection once the holder releases.
    pub async fn data_ready(self: &std::sync::Arc<Self>, pool: &WorkerPool) {
        match self.try_acquire() {
            Ok(mut guard) => {
                self.pull_transport(&mut guard).await;
                let has_records = guard.has_pending();
                drop(guard);
                if has_records {
                    pool.try_wake(self);
                }
            }
            Err(AcquireError::WouldBlock) => {
                self.set_need_receive();
                pool.try_wake(self);
            }
            Err(AcquireError::Invalid) => {}
        }
    }

    /// Drain the transport until it reports would-block or fails.
    ///
    /// Stream bytes run through record marking; datagrams become records
    /// directly. A framing error or fatal transport error marks the
    /// connection for disconnection and ends the pull; transient errors
    /// end it quietly.
    pub(crate) async fn pull_transport(&self, buffer: &mut ReassemblyBuffer) {
        loop {
            if self.should_disconnect() {
                return;
            }
            match self.transport.receive().await {
                Ok(Delivery::Bytes(bytes)) => {
                    if bytes.is_empty() {
                        // End of stream.
                        debug!("connection {}: peer finished sending", self.id);
                        self.mark_disconnect();
                        return;
                    }
                    buffer.extend_raw(&bytes);
                    match buffer.drain_buffer() {
                        Ok(completed) => metrics::inc_records(completed),
                        Err(err) => {
                            warn!("connection {}: framing error: {err}", self.id);
                            metrics::inc_errors();
                            self.mark_disconnect();
                            return;
                        }
                    }
                }
                Ok(Delivery::Datagram { payload, peer }) => {
                    buffer.push_datagram(payload, peer);
                    metrics::inc_records(1);
                }
                Err(TransportError::WouldBlock) => return,
                Err(err) => {
                    debug!("connection {}: fatal receive error: {err}", self.id);
                    metrics::inc_errors();
                    self.mark_disconnect();
                    return;
                }
            }
        }
    }
}
