//! Knowledge Core — durable, auditable memory for an agent orchestration
//! tool.
//!
//! Provides an append-only event ledger ([`evidence`]), a content-addressed
//! claim/node/edge store with bitemporal semantics and alias resolution
//! ([`thoughtdb`]), a deterministic retrieval layer that builds bounded
//! context subgraphs for model prompts ([`retrieval`]), provenance
//! traversal ([`why_trace`]), bounded subgraph extraction ([`subgraph`]),
//! and compaction ([`compaction`]).
//!
//! # Quick Start
//!
//! ```
//! use kc_core::{EvidenceLog, Store, thoughtdb::{NewClaim, ClaimType, Scope, Visibility, View}};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let mut events = EvidenceLog::new(tmp.path().join("evidence.jsonl"), "run1");
//! let event = events.append(serde_json::json!({"kind": "hands_input"})).unwrap();
//! assert_eq!(event["event_id"], "ev_run1_000001");
//!
//! let store = Store::new(
//!     tmp.path().join("claims.jsonl"),
//!     tmp.path().join("nodes.jsonl"),
//!     tmp.path().join("edges.jsonl"),
//! );
//! let empty = View::build("project", "p1", &[], &[], &[]);
//! store.create_claim(&empty, NewClaim {
//!     claim_type: ClaimType::Fact,
//!     text: "the deploy key rotates weekly".to_string(),
//!     scope: Scope::Project,
//!     project_id: "p1".to_string(),
//!     visibility: Visibility::Project,
//!     valid_from: None,
//!     valid_to: None,
//!     tags: vec![],
//!     source_refs: vec![],
//!     confidence: 1.0,
//!     notes: String::new(),
//! }).unwrap();
//! ```

pub mod capabilities;
pub mod compaction;
pub mod config;
pub mod error;
pub mod evidence;
pub mod ids;
pub mod operational_defaults;
pub mod paths;
pub mod retrieval;
pub mod storage;
pub mod subgraph;
pub mod thoughtdb;
pub mod why_trace;

pub use capabilities::{MindProvider, MindResponse, SearchHit, TextIndex};
pub use compaction::{compact, CompactionConfig, CompactionReport, FileCompactionStats, SnapshotOutcome};
pub use config::{CompactionSettings, Config, RetrievalSettings, WhyTraceSettings};
pub use error::{KcError, Result};
pub use evidence::EvidenceLog;
pub use operational_defaults::{resolve_setting, seed_defaults, DefaultSpec, ResolvedSetting, SeedReport};
pub use paths::{project_id, Layout};
pub use retrieval::{build_context, Budgets, Context, ProjectedClaim, ProjectedEdge, ProjectedNode};
pub use subgraph::{build_subgraph, Direction, Subgraph, SubgraphClaim, SubgraphEdge, SubgraphNode, ViewSelector};
pub use thoughtdb::{
    Claim, ClaimType, ClaimView, Edge, EdgeType, Node, NodeType, NodeView, Scope, SnapshotCache,
    SourceRef, Status, Store, View, Visibility,
};
pub use why_trace::{query_from_event, run_why_trace, WhyTraceConfig, WhyTraceResult};
