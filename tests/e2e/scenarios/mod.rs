mod compaction_preserves_effective_view;
mod dedup_via_signature;
mod same_as_redirects;
mod status_derivation;
mod temporal_validity;
mod why_trace_materialization;
