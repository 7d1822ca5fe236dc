//! Stream reassembly: from raw bytes to complete records.
//!
//! [`ReassemblyBuffer`] accumulates bytes delivered by the transport,
//! splits them at record-marking boundaries, and queues complete records
//! in arrival order. One logical record may span several fragments and
//! several reads; one read may carry many fragments. The buffer is a plain
//! data structure with no locking of its own: the connection's lifecycle
//! gate guarantees a single mutator.

use std::{collections::VecDeque, mem, net::SocketAddr};

use bytes::{Buf, Bytes, BytesMut};

use crate::framing::{FragmentHeader, FramingError, HEADER_LEN, Record};

/// Per-connection reassembly state and the queue of completed records.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    /// Bytes received but not yet split into fragments.
    raw: BytesMut,
    /// Payload of the logical record currently under reassembly.
    fragment: BytesMut,
    /// Header of the fragment whose payload is still incomplete.
    header: Option<FragmentHeader>,
    /// Complete records awaiting a worker, strict FIFO.
    pending: VecDeque<Record>,
    max_record_size: usize,
}

impl ReassemblyBuffer {
    /// Create an empty buffer enforcing `max_record_size` on reassembled
    /// records.
    #[must_use]
    pub fn new(max_record_size: usize) -> Self {
        Self {
            raw: BytesMut::new(),
            fragment: BytesMut::new(),
            header: None,
            pending: VecDeque::new(),
            max_record_size,
        }
    }

    /// Append freshly received stream bytes to the raw accumulator.
    pub fn extend_raw(&mut self, bytes: &[u8]) { self.raw.extend_from_slice(bytes); }

    /// Append one complete datagram directly to the record queue.
    ///
    /// Datagram transports carry no record marking; every receive yields
    /// exactly one record plus the sender address.
    pub fn push_datagram(&mut self, payload: Bytes, peer: SocketAddr) {
        self.pending.push_back(Record::new(payload, Some(peer)));
    }

    /// Split buffered bytes into complete records.
    ///
    /// Loops until no further progress is possible and returns the number
    /// of records completed by this call. Partial state (a decoded header
    /// whose payload has not fully arrived, or an unfinished logical
    /// record) is kept for the next call.
    ///
    /// # Errors
    ///
    /// Returns a [`FramingError`] when a header declares a length beyond
    /// the configured cap or would grow the record past it. Framing errors
    /// are fatal to the connection: the marking protocol defines no way to
    /// resynchronise the stream.
    pub fn drain_buffer(&mut self) -> Result<usize, FramingError> {
        let mut completed = 0;
        loop {
            let header = match self.header {
                Some(header) => header,
                None => {
                    if self.raw.len() < HEADER_LEN {
                        break;
                    }
                    let mut word = [0_u8; HEADER_LEN];
                    word.copy_from_slice(&self.raw[..HEADER_LEN]);
                    self.raw.advance(HEADER_LEN);
                    let header = FragmentHeader::decode(word);
                    self.check_fragment(header)?;
                    self.header = Some(header);
                    header
                }
            };

            if self.raw.len() < header.len() {
                // More data needed for this fragment's payload.
                break;
            }

            let payload = self.raw.split_to(header.len());
            self.fragment.extend_from_slice(&payload);
            self.header = None;

            if header.is_last() {
                let payload = mem::take(&mut self.fragment).freeze();
                self.pending.push_back(Record::new(payload, None));
                completed += 1;
            }
        }
        Ok(completed)
    }

    /// Take the oldest complete record, if any.
    pub fn next_record(&mut self) -> Option<Record> { self.pending.pop_front() }

    /// Re-queue a record for later delivery.
    ///
    /// Used when a deferred record's deadline elapses and it is handed
    /// back to the worker path.
    pub fn requeue(&mut self, record: Record) { self.pending.push_back(record); }

    /// Whether at least one complete record is queued.
    #[must_use]
    pub fn has_pending(&self) -> bool { !self.pending.is_empty() }

    /// Number of complete records queued.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.pending.len() }

    fn check_fragment(&self, header: FragmentHeader) -> Result<(), FramingError> {
        if header.len() > self.max_record_size {
            return Err(FramingError::OversizeFragment {
                declared: header.len(),
                limit: self.max_record_size,
            });
        }
        let attempted = self.fragment.len().saturating_add(header.len());
        if attempted > self.max_record_size {
            return Err(FramingError::OversizeRecord {
                attempted,
                limit: self.max_record_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
