//! Full-stack scenarios: transport deliveries through workers to replies.

use std::{io, sync::Arc, time::Duration};

use recmark::{
    framing::FragmentHeader,
    pool::WorkerPool,
    transport::{Transport, TransportError},
};
use recmark_testing::{EchoHandler, ScriptedTransport, wait_until};
use rstest::rstest;

#[rstest]
#[tokio::test]
async fn three_fragments_two_reads_one_record() {
    let pool = WorkerPool::builder().workers(2).build();
    pool.start(Arc::new(EchoHandler));

    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(Arc::clone(&transport) as Arc<dyn Transport>);

    // Read one: fragment 1 (10 bytes) complete, fragment 2's header only.
    let mut first = Vec::new();
    first.extend_from_slice(&FragmentHeader::new(10, false).encode());
    first.extend_from_slice(&[b'a'; 10]);
    first.extend_from_slice(&FragmentHeader::new(5, false).encode());
    transport.push_bytes(first);
    conn.data_ready(&pool).await;

    // Nothing complete yet: no reply may appear.
    assert!(transport.sent_payloads().is_empty());

    // Read two: fragment 2 payload, then the zero-length final fragment.
    let mut second = Vec::new();
    second.extend_from_slice(&[b'b'; 5]);
    second.extend_from_slice(&FragmentHeader::new(0, true).encode());
    transport.push_bytes(second);
    conn.data_ready(&pool).await;

    assert!(
        wait_until(Duration::from_secs(1), || {
            transport.sent_payloads().len() == 1
        })
        .await,
        "exactly one record should be served"
    );
    let sent = transport.sent_payloads();
    assert_eq!(sent[0].len(), 15);
    assert_eq!(&sent[0][..10], &[b'a'; 10]);
    assert_eq!(&sent[0][10..], &[b'b'; 5]);

    pool.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn datagram_reply_routes_to_the_sender() {
    let pool = WorkerPool::builder().workers(1).build();
    pool.start(Arc::new(EchoHandler));

    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(Arc::clone(&transport) as Arc<dyn Transport>);

    let peer = "192.0.2.7:2049".parse().expect("addr");
    transport.push_datagram(&b"status"[..], peer);
    conn.data_ready(&pool).await;

    assert!(wait_until(Duration::from_secs(1), || transport.sent().len() == 1).await);
    let sent = transport.sent();
    assert_eq!(sent[0].0, &b"status"[..]);
    assert_eq!(sent[0].1, Some(peer));

    pool.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn fatal_receive_error_marks_disconnect() {
    let pool = WorkerPool::builder().workers(1).build();
    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(Arc::clone(&transport) as Arc<dyn Transport>);

    transport.push_error(TransportError::Fatal(io::Error::from(
        io::ErrorKind::ConnectionReset,
    )));
    conn.data_ready(&pool).await;

    assert!(conn.should_disconnect());
    assert!(transport.sent_payloads().is_empty());
}

#[rstest]
#[tokio::test]
async fn transient_receive_error_changes_nothing() {
    let pool = WorkerPool::builder().workers(1).build();
    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(Arc::clone(&transport) as Arc<dyn Transport>);

    transport.push_error(TransportError::WouldBlock);
    conn.data_ready(&pool).await;

    assert!(!conn.should_disconnect());
    assert!(conn.is_valid());
}

#[rstest]
#[tokio::test]
async fn oversize_header_is_fatal_and_yields_no_record() {
    let pool = WorkerPool::builder().workers(1).max_record_size(16).build();
    pool.start(Arc::new(EchoHandler));

    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(Arc::clone(&transport) as Arc<dyn Transport>);

    let mut wire = Vec::new();
    wire.extend_from_slice(&FragmentHeader::new(64, true).encode());
    wire.extend_from_slice(&[0_u8; 64]);
    transport.push_bytes(wire);
    conn.data_ready(&pool).await;

    assert!(conn.should_disconnect());
    // Give any spurious scheduling a moment to surface.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(transport.sent_payloads().is_empty());

    pool.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn end_of_stream_marks_disconnect() {
    let pool = WorkerPool::builder().workers(1).build();
    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(Arc::clone(&transport) as Arc<dyn Transport>);

    transport.push_bytes(bytes::Bytes::new());
    conn.data_ready(&pool).await;

    assert!(conn.should_disconnect());
}
