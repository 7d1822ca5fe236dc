//! Worker loop: one record per dequeue, decode, execute, reply.

use std::{sync::Arc, time::Instant};

use tracing::{debug, warn};

use super::WorkerPool;
use crate::{
    connection::Connection,
    handler::{Disposition, RequestHandler},
    metrics,
};

/// Body of one worker task. Runs until the pool shuts down.
pub(super) async fn worker_loop<H: RequestHandler>(
    pool: Arc<WorkerPool>,
    handler: Arc<H>,
    worker_id: usize,
) {
    debug!("worker {worker_id} started");
    while let Some(conn) = pool.next_connection().await {
        service_connection(&pool, &conn, handler.as_ref()).await;
    }
    debug!("worker {worker_id} stopped");
}

/// Process one record of one connection.
///
/// Acquires the lifecycle gate (skipping connections drained while they
/// waited in the queue), folds in any expired deferred records, honours a
/// pending receive notification, then decodes and executes a single
/// record while still holding the gate. The reply is handed to the reply
/// serializer after release, and the connection is re-woken if records
/// remain so backlog is never stranded.
async fn service_connection<H: RequestHandler>(
    pool: &WorkerPool,
    conn: &Arc<Connection>,
    handler: &H,
) {
    let Ok(mut guard) = conn.acquire().await else {
        // Drained while queued; nothing to do.
        return;
    };

    conn.claim_expired_deferred(&mut guard, Instant::now());
    if conn.take_need_receive() {
        conn.pull_transport(&mut guard).await;
    }

    let outcome = match guard.next_record() {
        Some(record) => match handler.decode(&record) {
            Ok(request) => Some((record, handler.execute(request).await)),
            Err(err) => {
                warn!(
                    "connection {}: dropping undecodable record: {err}",
                    conn.id()
                );
                metrics::inc_errors();
                None
            }
        },
        None => None,
    };

    // A notification may have fired while this worker held the gate; pull
    // before releasing so the bytes are not stranded until the next event.
    while conn.take_need_receive() {
        conn.pull_transport(&mut guard).await;
    }
    let remaining = guard.has_pending();
    drop(guard);

    match outcome {
        Some((record, Disposition::Reply(payload))) => conn.submit(payload, record.peer()).await,
        Some((record, Disposition::Defer(delay))) => conn.defer(record, Instant::now() + delay),
        Some((_, Disposition::NoReply)) | None => {}
    }

    if remaining && conn.is_valid() {
        pool.try_wake(conn);
    }
}
