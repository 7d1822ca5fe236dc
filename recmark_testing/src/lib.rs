//! Utilities for driving `recmark` connections with scripted transports
//! during tests.
//!
//! [`ScriptedTransport`] replays a queue of deliveries and captures every
//! sent reply; [`EchoHandler`] reflects request payloads back unchanged;
//! [`wait_until`] polls a condition with a timeout so tests can observe
//! work finishing on pool workers.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use recmark::{
    framing::Record,
    handler::{DecodeError, Disposition, RequestHandler},
    transport::{Delivery, Transport, TransportError},
};
use tokio::sync::Semaphore;

/// Canonical result alias for test functions.
pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// In-memory transport replaying scripted deliveries.
///
/// `receive` pops the next scripted step and reports
/// [`TransportError::WouldBlock`] once the script is exhausted, matching a
/// drained socket buffer. Every `send` is captured for assertions. With
/// [`hold_sends`](ScriptedTransport::hold_sends) the transport blocks each
/// send on a permit, letting tests pin a reply in flight while more are
/// submitted behind it.
#[derive(Default)]
pub struct ScriptedTransport {
    deliveries: Mutex<VecDeque<Result<Delivery, TransportError>>>,
    sent: Mutex<Vec<(Bytes, Option<SocketAddr>)>>,
    send_attempts: AtomicUsize,
    send_gate: Option<Semaphore>,
}

impl ScriptedTransport {
    /// Transport whose sends complete immediately.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Transport whose sends each wait for one permit from
    /// [`release_sends`](ScriptedTransport::release_sends).
    #[must_use]
    pub fn hold_sends() -> Self {
        Self {
            send_gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Script a slice of stream bytes.
    pub fn push_bytes(&self, bytes: impl Into<Bytes>) {
        self.locked_deliveries()
            .push_back(Ok(Delivery::Bytes(bytes.into())));
    }

    /// Script one datagram delivery.
    pub fn push_datagram(&self, payload: impl Into<Bytes>, peer: SocketAddr) {
        self.locked_deliveries().push_back(Ok(Delivery::Datagram {
            payload: payload.into(),
            peer,
        }));
    }

    /// Script a receive error.
    pub fn push_error(&self, err: TransportError) {
        self.locked_deliveries().push_back(Err(err));
    }

    /// Allow `count` held sends to proceed.
    ///
    /// # Panics
    ///
    /// Panics if the transport was not built with
    /// [`hold_sends`](ScriptedTransport::hold_sends).
    pub fn release_sends(&self, count: usize) {
        self.send_gate
            .as_ref()
            .expect("transport built without hold_sends")
            .add_permits(count);
    }

    /// Payloads sent so far, in transmission order.
    #[must_use]
    pub fn sent_payloads(&self) -> Vec<Bytes> {
        self.locked_sent()
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect()
    }

    /// Full send log including datagram destinations.
    #[must_use]
    pub fn sent(&self) -> Vec<(Bytes, Option<SocketAddr>)> { self.locked_sent().clone() }

    /// Number of sends started, including any currently held by the gate.
    #[must_use]
    pub fn send_attempts(&self) -> usize { self.send_attempts.load(Ordering::Acquire) }

    fn locked_deliveries(
        &self,
    ) -> MutexGuard<'_, VecDeque<Result<Delivery, TransportError>>> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn locked_sent(&self) -> MutexGuard<'_, Vec<(Bytes, Option<SocketAddr>)>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn receive(&self) -> Result<Delivery, TransportError> {
        self.locked_deliveries()
            .pop_front()
            .unwrap_or(Err(TransportError::WouldBlock))
    }

    async fn send(&self, payload: Bytes, peer: Option<SocketAddr>) -> Result<(), TransportError> {
        self.send_attempts.fetch_add(1, Ordering::AcqRel);
        if let Some(gate) = &self.send_gate {
            gate.acquire()
                .await
                .expect("send gate closed")
                .forget();
        }
        self.locked_sent().push((payload, peer));
        Ok(())
    }
}

/// Handler reflecting each request payload back as the reply.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    type Request = Bytes;

    fn decode(&self, record: &Record) -> Result<Self::Request, DecodeError> {
        Ok(Bytes::copy_from_slice(record.payload()))
    }

    async fn execute(&self, request: Self::Request) -> Disposition {
        Disposition::Reply(request)
    }
}

/// Poll `cond` until it holds or `timeout` elapses. Returns whether the
/// condition was observed.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    true
}
