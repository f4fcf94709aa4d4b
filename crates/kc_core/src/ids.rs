//! Identity generation: run ids, event ids, and claim/node/edge ids.
//!
//! Ids are deliberately opaque strings with a kind-specific prefix
//! (`ev_`, `cl_`, `nd_`, `ed_`) so downstream consumers can dispatch on
//! prefix alone (see the polymorphism note in the design docs).

use chrono::{SecondsFormat, Utc};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generates a fresh opaque run id: nanosecond timestamp + random suffix.
///
/// Uniqueness of `event_id`s across writers sharing a path depends on
/// `run_id`s never colliding; the random suffix makes that practical even
/// when two writers start within the same nanosecond (e.g. in fast tests).
pub fn new_run_id() -> String {
    format!("{:x}{}", now_ns(), short_hex(8))
}

/// Formats an event id from a run id and 1-based sequence number.
///
/// Format: `ev_<run_id>_<6-digit-zero-padded-seq>`.
pub fn format_event_id(run_id: &str, seq: u64) -> String {
    format!("ev_{run_id}_{seq:06}")
}

/// Generates a fresh claim id: `cl_<ns-time>_<hex4>`.
pub fn new_claim_id() -> String {
    new_record_id("cl")
}

/// Generates a fresh node id: `nd_<ns-time>_<hex4>`.
pub fn new_node_id() -> String {
    new_record_id("nd")
}

/// Generates a fresh edge id: `ed_<ns-time>_<hex4>`.
pub fn new_edge_id() -> String {
    new_record_id("ed")
}

fn new_record_id(prefix: &str) -> String {
    format!("{prefix}_{:x}_{}", now_ns(), short_hex(4))
}

fn now_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos()
}

fn short_hex(chars: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..chars.min(hex.len())].to_string()
}

/// Returns the id kind implied by its prefix, or `None` if unrecognized.
pub fn kind_of(id: &str) -> Option<&'static str> {
    if id.starts_with("ev_") {
        Some("event")
    } else if id.starts_with("cl_") {
        Some("claim")
    } else if id.starts_with("nd_") {
        Some("node")
    } else if id.starts_with("ed_") {
        Some("edge")
    } else {
        None
    }
}

/// Returns the current time as an RFC3339 UTC timestamp string.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
