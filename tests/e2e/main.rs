//! End-to-end scenarios for Knowledge Core, driven entirely through the
//! public `kc_core` API (no internal record-building helpers).

mod harness;
mod scenarios;
