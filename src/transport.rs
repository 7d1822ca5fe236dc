//! Transport seam consumed by the framing and dispatch layers.
//!
//! The crate never owns a socket. The owning server supplies an object
//! implementing [`Transport`] per connection and invokes
//! [`Connection::data_ready`](crate::connection::Connection::data_ready)
//! whenever the transport signals that more data is available. Receive
//! errors carry their own transient/fatal classification; this layer only
//! reacts to it.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// One delivery produced by [`Transport::receive`].
#[derive(Clone, Debug)]
pub enum Delivery {
    /// A slice of an ordered byte stream, to be run through record marking.
    ///
    /// An empty slice signals end of stream and is treated as a fatal
    /// condition by the receive path.
    Bytes(Bytes),
    /// One complete datagram. Datagram transports bypass framing: each
    /// delivery already forms exactly one record.
    Datagram {
        /// Payload of the datagram.
        payload: Bytes,
        /// Address the datagram arrived from, used to route the reply.
        peer: SocketAddr,
    },
}

/// Errors surfaced by transport primitives.
///
/// The transient/fatal split drives the retry policy: [`WouldBlock`] ends
/// the current receive pull and is retried on the next data-ready
/// notification with no state change; everything else marks the connection
/// for disconnection.
///
/// [`WouldBlock`]: TransportError::WouldBlock
#[derive(Debug, Error)]
pub enum TransportError {
    /// No data available right now; retry on the next notification.
    #[error("transport would block")]
    WouldBlock,
    /// The peer closed the connection.
    #[error("transport closed by peer")]
    Closed,
    /// An unrecoverable transport failure, for example a peer reset.
    #[error("fatal transport error: {0}")]
    Fatal(#[from] io::Error),
}

impl TransportError {
    /// Whether the error is transient and the operation may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool { matches!(self, Self::WouldBlock) }
}

/// Send and receive primitives for one connection.
///
/// `receive` must be non-blocking-capable: when no data is buffered it
/// returns [`TransportError::WouldBlock`] rather than waiting, because it
/// is called while the connection's lifecycle gate is held. `send`
/// transmits a whole reply payload or fails; partial-write handling
/// belongs to the implementation.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Pull the next available delivery.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::WouldBlock`] when no data is ready,
    /// [`TransportError::Closed`] or [`TransportError::Fatal`] on
    /// unrecoverable conditions.
    async fn receive(&self) -> Result<Delivery, TransportError>;

    /// Transmit one reply payload.
    ///
    /// `peer` is the datagram destination and is `None` on stream
    /// transports.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the payload could not be sent. The
    /// reply serializer logs and discards the failure; replies are never
    /// retried.
    async fn send(&self, payload: Bytes, peer: Option<SocketAddr>) -> Result<(), TransportError>;
}
