//! Drain semantics: cooperative, idempotent, permanent.

use std::{sync::Arc, time::Duration};

use recmark::{connection::AcquireError, framing::encode_record, pool::WorkerPool};
use recmark_testing::ScriptedTransport;
use rstest::rstest;
use tokio::time::{sleep, timeout};

#[rstest]
#[tokio::test]
async fn drain_waits_for_the_busy_holder() {
    let pool = WorkerPool::builder().workers(1).build();
    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(transport);

    let guard = conn.acquire().await.expect("gate is free");

    let draining = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.drain().await })
    };
    sleep(Duration::from_millis(50)).await;
    assert!(!draining.is_finished(), "drain must wait for the holder");

    drop(guard);
    timeout(Duration::from_secs(1), draining)
        .await
        .expect("drain completes once the holder releases")
        .expect("drain task");

    assert!(!conn.is_valid());
}

#[rstest]
#[tokio::test]
async fn every_acquire_fails_after_drain() {
    let pool = WorkerPool::builder().workers(1).build();
    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(transport);

    conn.drain().await;

    assert_eq!(
        conn.acquire().await.expect_err("acquire must fail"),
        AcquireError::Invalid
    );
    assert_eq!(
        conn.try_acquire().expect_err("try_acquire must fail"),
        AcquireError::Invalid
    );
}

#[rstest]
#[tokio::test]
async fn drain_is_idempotent() {
    let pool = WorkerPool::builder().workers(1).build();
    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(transport);

    conn.drain().await;
    timeout(Duration::from_secs(1), conn.drain())
        .await
        .expect("second drain returns immediately");
}

#[rstest]
#[tokio::test]
async fn notification_after_drain_is_a_no_op() {
    let pool = WorkerPool::builder().workers(1).build();
    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(Arc::clone(&transport) as Arc<dyn recmark::transport::Transport>);

    conn.drain().await;
    transport.push_bytes(encode_record(
        b"late",
        std::num::NonZeroUsize::new(64).expect("cap"),
    ));
    conn.data_ready(&pool).await;

    assert_eq!(pool.backlog_len(), 0);
    assert!(transport.sent_payloads().is_empty());
}

#[rstest]
#[tokio::test]
async fn detach_drains_and_unregisters() {
    let pool = WorkerPool::builder().workers(1).build();
    let transport = Arc::new(ScriptedTransport::new());
    let conn = pool.attach(transport);

    pool.detach(&conn).await;
    assert!(!conn.is_valid());
    // A drained connection never re-enters the sweep or the queue.
    assert!(!pool.sweep_deferred(std::time::Instant::now()));
    assert_eq!(pool.backlog_len(), 0);
}
