//! Unit tests for record-marking reassembly.

use std::num::NonZeroUsize;

use bytes::Bytes;

use super::ReassemblyBuffer;
use crate::framing::{DEFAULT_MAX_RECORD_SIZE, FragmentHeader, FramingError, encode_record};

fn buffer() -> ReassemblyBuffer { ReassemblyBuffer::new(DEFAULT_MAX_RECORD_SIZE) }

fn feed(buffer: &mut ReassemblyBuffer, bytes: &[u8]) -> usize {
    buffer.extend_raw(bytes);
    buffer.drain_buffer().expect("framing should succeed")
}

#[test]
fn single_fragment_record() {
    let mut buffer = buffer();
    let encoded = encode_record(b"hello", NonZeroUsize::new(64).expect("cap"));
    assert_eq!(feed(&mut buffer, &encoded), 1);
    let record = buffer.next_record().expect("one record");
    assert_eq!(record.payload(), b"hello");
    assert!(record.peer().is_none());
}

#[test]
fn record_split_across_fragments() {
    let mut buffer = buffer();
    let encoded = encode_record(b"abcdefgh", NonZeroUsize::new(3).expect("cap"));
    assert_eq!(feed(&mut buffer, &encoded), 1);
    assert_eq!(buffer.next_record().expect("record").payload(), b"abcdefgh");
}

#[test]
fn byte_at_a_time_delivery() {
    let mut buffer = buffer();
    let encoded = encode_record(b"one byte at a time", NonZeroUsize::new(4).expect("cap"));
    let mut completed = 0;
    for byte in &encoded {
        completed += feed(&mut buffer, std::slice::from_ref(byte));
    }
    assert_eq!(completed, 1);
    assert_eq!(
        buffer.next_record().expect("record").payload(),
        b"one byte at a time"
    );
}

#[test]
fn many_records_in_one_read() {
    let mut buffer = buffer();
    let cap = NonZeroUsize::new(8).expect("cap");
    let mut wire = Vec::new();
    for payload in [&b"first"[..], b"second", b"third"] {
        wire.extend_from_slice(&encode_record(payload, cap));
    }
    assert_eq!(feed(&mut buffer, &wire), 3);
    assert_eq!(buffer.next_record().expect("record").payload(), b"first");
    assert_eq!(buffer.next_record().expect("record").payload(), b"second");
    assert_eq!(buffer.next_record().expect("record").payload(), b"third");
    assert!(buffer.next_record().is_none());
}

#[test]
fn zero_length_final_fragment_yields_empty_record() {
    let mut buffer = buffer();
    let wire = FragmentHeader::new(0, true).encode();
    assert_eq!(feed(&mut buffer, &wire), 1);
    assert!(buffer.next_record().expect("record").payload().is_empty());
}

#[test]
fn zero_length_mid_fragment_contributes_nothing() {
    let mut buffer = buffer();
    let mut wire = Vec::new();
    wire.extend_from_slice(&FragmentHeader::new(0, false).encode());
    wire.extend_from_slice(&FragmentHeader::new(4, true).encode());
    wire.extend_from_slice(b"tail");
    assert_eq!(feed(&mut buffer, &wire), 1);
    assert_eq!(buffer.next_record().expect("record").payload(), b"tail");
}

#[test]
fn oversize_fragment_is_fatal_and_yields_nothing() {
    let mut buffer = ReassemblyBuffer::new(16);
    let mut wire = Vec::new();
    wire.extend_from_slice(&FragmentHeader::new(17, true).encode());
    wire.extend_from_slice(&[0_u8; 17]);
    buffer.extend_raw(&wire);
    let err = buffer.drain_buffer().expect_err("oversize must fail");
    assert_eq!(
        err,
        FramingError::OversizeFragment {
            declared: 17,
            limit: 16
        }
    );
    assert!(!buffer.has_pending());
}

#[test]
fn accumulated_fragments_hit_record_cap() {
    let mut buffer = ReassemblyBuffer::new(16);
    let mut wire = Vec::new();
    wire.extend_from_slice(&FragmentHeader::new(10, false).encode());
    wire.extend_from_slice(&[0_u8; 10]);
    wire.extend_from_slice(&FragmentHeader::new(10, true).encode());
    wire.extend_from_slice(&[0_u8; 10]);
    buffer.extend_raw(&wire);
    let err = buffer
        .drain_buffer()
        .expect_err("accumulated oversize must fail");
    assert_eq!(
        err,
        FramingError::OversizeRecord {
            attempted: 20,
            limit: 16
        }
    );
}

#[test]
fn split_header_across_reads() {
    let mut buffer = buffer();
    let encoded = encode_record(b"split header", NonZeroUsize::new(64).expect("cap"));
    assert_eq!(feed(&mut buffer, &encoded[..2]), 0);
    assert_eq!(feed(&mut buffer, &encoded[2..]), 1);
    assert_eq!(
        buffer.next_record().expect("record").payload(),
        b"split header"
    );
}

#[test]
fn fragments_ten_five_zero_across_two_reads() {
    // First read: fragment 1 header+payload plus fragment 2's header.
    // Second read: fragment 2 payload plus fragment 3 header (zero-length,
    // last). Exactly one fifteen-byte record must come out.
    let mut buffer = buffer();
    let mut first = Vec::new();
    first.extend_from_slice(&FragmentHeader::new(10, false).encode());
    first.extend_from_slice(&[b'a'; 10]);
    first.extend_from_slice(&FragmentHeader::new(5, false).encode());

    let mut second = Vec::new();
    second.extend_from_slice(&[b'b'; 5]);
    second.extend_from_slice(&FragmentHeader::new(0, true).encode());

    assert_eq!(feed(&mut buffer, &first), 0);
    assert_eq!(feed(&mut buffer, &second), 1);

    let record = buffer.next_record().expect("record");
    assert_eq!(record.payload().len(), 15);
    assert_eq!(&record.payload()[..10], &[b'a'; 10]);
    assert_eq!(&record.payload()[10..], &[b'b'; 5]);
    assert!(buffer.next_record().is_none());
}

#[test]
fn datagrams_bypass_framing() {
    let mut buffer = buffer();
    let peer = "127.0.0.1:2049".parse().expect("addr");
    buffer.push_datagram(Bytes::from_static(b"dgram"), peer);
    let record = buffer.next_record().expect("record");
    assert_eq!(record.payload(), b"dgram");
    assert_eq!(record.peer(), Some(peer));
}
