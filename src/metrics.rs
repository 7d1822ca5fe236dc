//! Metric helpers for `recmark`.
//!
//! This module defines metric names and small helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. With the `metrics`
//! feature disabled the helpers compile to no-ops so call sites stay
//! unconditional.

/// Name of the gauge tracking attached connections.
pub const CONNECTIONS_ACTIVE: &str = "recmark_connections_active";
/// Name of the counter tracking reassembled records.
pub const RECORDS_REASSEMBLED: &str = "recmark_records_reassembled_total";
/// Name of the counter tracking transmitted replies.
pub const REPLIES_SENT: &str = "recmark_replies_sent_total";
/// Name of the counter tracking framing, decode, and transport errors.
pub const ERRORS_TOTAL: &str = "recmark_errors_total";

/// Increment the attached connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    metrics::gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the attached connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    metrics::gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record `count` newly reassembled records.
pub fn inc_records(count: usize) {
    #[cfg(feature = "metrics")]
    metrics::counter!(RECORDS_REASSEMBLED).increment(u64::try_from(count).unwrap_or(u64::MAX));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record one transmitted reply.
pub fn inc_replies() {
    #[cfg(feature = "metrics")]
    metrics::counter!(REPLIES_SENT).increment(1);
}

/// Record an error occurrence.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    metrics::counter!(ERRORS_TOTAL).increment(1);
}
