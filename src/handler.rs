//! Request decode and execute seam.
//!
//! The framing layer treats payloads as opaque bytes. The owning server
//! supplies a [`RequestHandler`] that turns a reassembled [`Record`] into a
//! typed request and computes the reply. Handlers run on pool workers and
//! may block; pool sizing accounts for that.

use std::time::Duration;

use async_trait::async_trait;
use bincode::{BorrowDecode, Encode, borrow_decode_from_slice, config, encode_to_vec};
use bytes::Bytes;
use thiserror::Error;

use crate::framing::Record;

/// Errors raised while decoding a record into a typed request.
///
/// A decode failure belongs to the peer's payload, not to the framing: the
/// record is logged and dropped while the connection stays up.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The record's byte layout did not match the expected request shape.
    #[error("malformed request record: {0}")]
    Malformed(String),
    /// Deserialisation of the payload failed.
    #[error("failed to decode request payload: {0}")]
    Payload(#[from] bincode::error::DecodeError),
}

/// What the worker should do with a record after its handler ran.
#[derive(Debug)]
pub enum Disposition {
    /// Transmit the payload back over the record's connection.
    Reply(Bytes),
    /// The request produced no reply.
    NoReply,
    /// Re-deliver the record after the given delay.
    ///
    /// Used for write-gathering-style coalescing: the record joins the
    /// connection's deferred list and the deadline sweep forces it back
    /// through the worker path once the delay elapses.
    Defer(Duration),
}

/// Decode and execute seam supplied by the owning server.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Typed request produced by [`decode`](RequestHandler::decode).
    type Request: Send;

    /// Turn a reassembled record into a typed request.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the payload does not parse; the
    /// worker logs it and drops the record.
    fn decode(&self, record: &Record) -> Result<Self::Request, DecodeError>;

    /// Execute the request and decide what happens next.
    async fn execute(&self, request: Self::Request) -> Disposition;
}

/// Wrapper trait for typed request and reply payloads.
///
/// Any type deriving bincode's [`Encode`] and [`BorrowDecode`] implements
/// this trait via the blanket impl; the default methods serialise with
/// bincode's standard configuration. Handlers that speak typed messages
/// can lean on [`decode_message`] instead of hand-rolling payload parsing.
pub trait Message: Encode + for<'de> BorrowDecode<'de, ()> {
    /// Serialise the message into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`](bincode::error::EncodeError) if
    /// serialisation fails.
    fn to_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        encode_to_vec(self, config::standard())
    }

    /// Deserialise a message from a byte slice, returning the message and
    /// the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`](bincode::error::DecodeError) if
    /// deserialisation fails.
    fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), bincode::error::DecodeError>
    where
        Self: Sized,
    {
        borrow_decode_from_slice(bytes, config::standard())
    }
}

impl<T> Message for T where for<'de> T: Encode + BorrowDecode<'de, ()> {}

/// Decode a record payload into a typed [`Message`].
///
/// # Errors
///
/// Returns [`DecodeError::Payload`] when the payload does not deserialise.
pub fn decode_message<M: Message>(record: &Record) -> Result<M, DecodeError> {
    let (message, _) = M::from_bytes(record.payload())?;
    Ok(message)
}
