#![doc(html_root_url = "https://docs.rs/recmark/latest")]
//! Transport framing and request dispatch for stream/datagram RPC servers.
//!
//! `recmark` turns the raw bytes arriving on a connection into discrete,
//! fully reassembled request records, hands each record to one of a
//! bounded pool of workers, and serialises the replies flowing back out
//! over the same connection. Four concerns meet here under concurrency:
//! record-marked framing that may split one logical message across many
//! fragments and reads, a worker pool that is woken exactly when work
//! exists, per-connection mutual exclusion over reassembly, and
//! per-connection reply ordering.
//!
//! The surrounding server supplies the transport, the request handler,
//! and connection bookkeeping; see [`transport::Transport`] and
//! [`handler::RequestHandler`] for the seams, and
//! [`pool::WorkerPool`] for the entry points (`attach`, `try_wake`,
//! `detach`, `sweep_deferred`).

pub mod connection;
pub mod framing;
pub mod handler;
pub mod metrics;
pub mod pool;
pub mod reassembly;
pub mod transport;

pub use connection::{AcquireError, Connection, StreamGuard};
pub use framing::{
    DEFAULT_MAX_RECORD_SIZE,
    FragmentHeader,
    FramingError,
    HEADER_LEN,
    MAX_FRAGMENT_LEN,
    Record,
    encode_record,
};
pub use handler::{DecodeError, Disposition, Message, RequestHandler, decode_message};
pub use pool::{ConnectionId, PoolConfig, WorkerPool, WorkerPoolBuilder};
pub use reassembly::ReassemblyBuffer;
pub use transport::{Delivery, Transport, TransportError};
