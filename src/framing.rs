//! Record-marking wire format.
//!
//! Every fragment on a byte-stream transport is prefixed by a four-byte
//! big-endian header: the low 31 bits carry the fragment payload length and
//! the top bit is set on the final fragment of a logical record. A logical
//! record is the concatenation of all fragment payloads up to and including
//! the one marked last. Zero-length fragments, including a zero-length
//! final fragment, are legal.

use std::{net::SocketAddr, num::NonZeroUsize};

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Number of bytes in a fragment header.
pub const HEADER_LEN: usize = 4;

/// Mask selecting the last-fragment bit in a decoded header word.
const LAST_FRAGMENT_BIT: u32 = 0x8000_0000;

/// Largest payload length a fragment header can carry (31 bits).
pub const MAX_FRAGMENT_LEN: usize = (LAST_FRAGMENT_BIT - 1) as usize;

/// Default ceiling on the size of a reassembled record.
///
/// A peer declaring a fragment that would push a record past this limit is
/// treated as corrupt or hostile; the marking protocol defines no
/// resynchronisation point, so the connection is torn down instead.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 64 * 1024;

/// Errors raised while interpreting record-marking headers.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// A fragment header declared a length beyond the configured record cap.
    #[error("fragment of {declared} bytes exceeds record cap of {limit} bytes")]
    OversizeFragment { declared: usize, limit: usize },
    /// Accumulated fragments would grow a record beyond the configured cap.
    #[error("record of {attempted} bytes exceeds record cap of {limit} bytes")]
    OversizeRecord { attempted: usize, limit: usize },
}

/// Decoded fragment header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentHeader {
    len: usize,
    last: bool,
}

impl FragmentHeader {
    /// Construct a header from a payload length and last-fragment marker.
    #[must_use]
    pub const fn new(len: usize, last: bool) -> Self { Self { len, last } }

    /// Decode a header from its four-byte wire representation.
    #[must_use]
    pub fn decode(bytes: [u8; HEADER_LEN]) -> Self {
        let word = u32::from_be_bytes(bytes);
        Self {
            len: (word & !LAST_FRAGMENT_BIT) as usize,
            last: word & LAST_FRAGMENT_BIT != 0,
        }
    }

    /// Encode the header into its four-byte wire representation.
    ///
    /// # Panics
    ///
    /// Panics if the payload length cannot be represented in 31 bits;
    /// callers fragment payloads well below that bound.
    #[must_use]
    pub fn encode(self) -> [u8; HEADER_LEN] {
        let len = u32::try_from(self.len).expect("fragment length exceeds 31 bits");
        assert_eq!(len & LAST_FRAGMENT_BIT, 0, "fragment length exceeds 31 bits");
        let word = if self.last { len | LAST_FRAGMENT_BIT } else { len };
        word.to_be_bytes()
    }

    /// Payload length carried by this fragment.
    #[must_use]
    pub const fn len(self) -> usize { self.len }

    /// Whether the fragment carries no payload bytes.
    #[must_use]
    pub const fn is_empty(self) -> bool { self.len == 0 }

    /// Whether this fragment completes its logical record.
    #[must_use]
    pub const fn is_last(self) -> bool { self.last }
}

/// A fully reassembled request record.
///
/// The payload is immutable once assembled. Datagram transports attach the
/// sender address so replies can be routed back to the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    payload: Bytes,
    peer: Option<SocketAddr>,
}

impl Record {
    /// Construct a record from an assembled payload.
    #[must_use]
    pub const fn new(payload: Bytes, peer: Option<SocketAddr>) -> Self { Self { payload, peer } }

    /// Borrow the record payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }

    /// Consume the record, returning the owned payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }

    /// Sender address, present only for datagram transports.
    #[must_use]
    pub const fn peer(&self) -> Option<SocketAddr> { self.peer }
}

/// Encode `payload` as a record-marked byte sequence.
///
/// The payload is split into fragments of at most `fragment_cap` bytes; the
/// final fragment carries the last-fragment bit. Caps above
/// [`MAX_FRAGMENT_LEN`] are clamped so every fragment stays representable
/// in a header. An empty payload encodes as a single zero-length final
/// fragment. Used by clients and tests; the server side only decodes.
#[must_use]
pub fn encode_record(payload: &[u8], fragment_cap: NonZeroUsize) -> Bytes {
    let cap = fragment_cap.get().min(MAX_FRAGMENT_LEN);
    let fragments = payload.chunks(cap).count().max(1);
    let mut out = BytesMut::with_capacity(payload.len() + fragments * HEADER_LEN);

    if payload.is_empty() {
        out.put_slice(&FragmentHeader::new(0, true).encode());
        return out.freeze();
    }

    let mut chunks = payload.chunks(cap).peekable();
    while let Some(chunk) = chunks.next() {
        let last = chunks.peek().is_none();
        out.put_slice(&FragmentHeader::new(chunk.len(), last).encode());
        out.put_slice(chunk);
    }
    out.freeze()
}
