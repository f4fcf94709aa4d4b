//! ThoughtDB: claims, nodes, and edges over an append-only JSONL store,
//! materialized into a read-optimized [`view::View`].

pub mod signature;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod view;

pub use signature::{claim_signature, existing_signature_map, existing_signatures, normalize_text};
pub use snapshot::SnapshotCache;
pub use store::{ClaimWriteOutcome, NewClaim, NewEdge, NewNode, NodeWriteOutcome, Store};
pub use types::{
    Claim, ClaimRecord, ClaimRetract, ClaimType, Edge, EdgeType, Node, NodeRecord, NodeRetract,
    NodeType, Scope, SourceRef, Status, Visibility,
};
pub use view::{ClaimView, NodeView, View};
