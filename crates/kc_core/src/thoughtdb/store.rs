//! Append-only writers for claims, nodes, and edges: validation, clamping,
//! signature-based dedup (invariant 4), and visibility clamping on edges
//! (invariant 8).

use super::signature::{claim_signature, existing_signature_map};
use super::types::{
    clamp_source_refs, clamp_tags, clamp_title, Claim, ClaimRecord, ClaimRetract, ClaimType, Edge,
    EdgeType, Node, NodeRecord, NodeRetract, NodeType, Scope, SourceRef, Visibility,
    MAX_SOURCE_REFS_CLAIM, MAX_SOURCE_REFS_NODE,
};
use super::view::View;
use crate::error::{KcError, Result};
use crate::ids;
use crate::storage;
use std::path::{Path, PathBuf};

/// Inputs to create a new claim, before id/timestamp/clamping are applied.
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub claim_type: ClaimType,
    pub text: String,
    pub scope: Scope,
    pub project_id: String,
    pub visibility: Visibility,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub tags: Vec<String>,
    pub source_refs: Vec<SourceRef>,
    pub confidence: f64,
    pub notes: String,
}

/// Inputs to create a new node.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub node_type: NodeType,
    pub title: String,
    pub text: String,
    pub scope: Scope,
    pub project_id: String,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub source_refs: Vec<SourceRef>,
    pub confidence: f64,
    pub notes: String,
}

/// Inputs to create a new edge.
#[derive(Debug, Clone)]
pub struct NewEdge {
    pub edge_type: EdgeType,
    pub from_id: String,
    pub to_id: String,
    pub scope: Scope,
    pub project_id: String,
    pub source_refs: Vec<SourceRef>,
    pub notes: String,
}

/// Result of attempting to create a claim: either a genuinely new claim, or
/// a redirect to an existing claim with an identical signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimWriteOutcome {
    Created(String),
    Deduplicated(String),
}

/// Result of attempting to create a node. Nodes are not deduplicated by
/// signature (only claims are, per §4.3) — creation always succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeWriteOutcome {
    pub node_id: String,
}

/// Paths to the three ThoughtDB JSONL files for one scope.
#[derive(Debug, Clone)]
pub struct Store {
    pub claims_path: PathBuf,
    pub nodes_path: PathBuf,
    pub edges_path: PathBuf,
}

impl Store {
    pub fn new(
        claims_path: impl Into<PathBuf>,
        nodes_path: impl Into<PathBuf>,
        edges_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            claims_path: claims_path.into(),
            nodes_path: nodes_path.into(),
            edges_path: edges_path.into(),
        }
    }

    pub fn claims_path(&self) -> &Path {
        &self.claims_path
    }

    pub fn nodes_path(&self) -> &Path {
        &self.nodes_path
    }

    pub fn edges_path(&self) -> &Path {
        &self.edges_path
    }

    /// Creates a claim, or returns the id of an existing claim with an
    /// identical signature (invariant 4). Dedup only considers claims that
    /// are not themselves aliases.
    pub fn create_claim(&self, view: &View, input: NewClaim) -> Result<ClaimWriteOutcome> {
        if input.text.trim().is_empty() {
            return Err(KcError::EmptyField { field: "text" });
        }

        let sig = claim_signature(input.claim_type, input.scope, &input.project_id, &input.text);
        let existing = existing_signature_map(view);
        if let Some(existing_id) = existing.get(&sig) {
            return Ok(ClaimWriteOutcome::Deduplicated(existing_id.clone()));
        }

        let claim = Claim {
            claim_id: ids::new_claim_id(),
            claim_type: input.claim_type,
            text: input.text,
            scope: input.scope,
            project_id: input.project_id,
            visibility: input.visibility,
            asserted_ts: ids::now_rfc3339(),
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            tags: clamp_tags(input.tags),
            source_refs: clamp_source_refs(input.source_refs, MAX_SOURCE_REFS_CLAIM),
            confidence: input.confidence.clamp(0.0, 1.0),
            notes: input.notes,
            version: "v1".to_string(),
        };
        let claim_id = claim.claim_id.clone();
        storage::append_jsonl_line(&self.claims_path, &ClaimRecord::Claim(claim))?;
        Ok(ClaimWriteOutcome::Created(claim_id))
    }

    /// Appends a retraction record for `claim_id`. Does not verify the id
    /// exists; retracting an unknown id is a no-op from the View's
    /// perspective (its `claim_status` stays `unknown`).
    pub fn retract_claim(
        &self,
        claim_id: impl Into<String>,
        rationale: impl Into<String>,
        source_refs: Vec<SourceRef>,
    ) -> Result<()> {
        let retract = ClaimRetract {
            claim_id: claim_id.into(),
            rationale: rationale.into(),
            source_refs: clamp_source_refs(source_refs, MAX_SOURCE_REFS_CLAIM),
            ts: ids::now_rfc3339(),
        };
        storage::append_jsonl_line(&self.claims_path, &ClaimRecord::ClaimRetract(retract))
    }

    /// Creates a node. Nodes are never deduplicated by signature.
    pub fn create_node(&self, input: NewNode) -> Result<NodeWriteOutcome> {
        if input.text.trim().is_empty() {
            return Err(KcError::EmptyField { field: "text" });
        }
        if input.title.trim().is_empty() {
            return Err(KcError::EmptyField { field: "title" });
        }

        let node = Node {
            node_id: ids::new_node_id(),
            node_type: input.node_type,
            title: clamp_title(&input.title),
            text: input.text,
            scope: input.scope,
            project_id: input.project_id,
            visibility: input.visibility,
            asserted_ts: ids::now_rfc3339(),
            tags: clamp_tags(input.tags),
            source_refs: clamp_source_refs(input.source_refs, MAX_SOURCE_REFS_NODE),
            confidence: input.confidence.clamp(0.0, 1.0),
            notes: input.notes,
            version: "v1".to_string(),
        };
        let node_id = node.node_id.clone();
        storage::append_jsonl_line(&self.nodes_path, &NodeRecord::Node(node))?;
        Ok(NodeWriteOutcome { node_id })
    }

    /// Appends a retraction record for `node_id`.
    pub fn retract_node(
        &self,
        node_id: impl Into<String>,
        rationale: impl Into<String>,
        source_refs: Vec<SourceRef>,
    ) -> Result<()> {
        let retract = NodeRetract {
            node_id: node_id.into(),
            rationale: rationale.into(),
            source_refs: clamp_source_refs(source_refs, MAX_SOURCE_REFS_NODE),
            ts: ids::now_rfc3339(),
        };
        storage::append_jsonl_line(&self.nodes_path, &NodeRecord::NodeRetract(retract))
    }

    /// Creates an edge. `visibility` is derived from the endpoints, clamped
    /// to the more restrictive of the two (invariant 8) — it is not an
    /// input, since an edge can never be more visible than what it connects.
    pub fn create_edge(&self, view: &View, input: NewEdge) -> Result<String> {
        if input.from_id.trim().is_empty() {
            return Err(KcError::MissingId("from_id"));
        }
        if input.to_id.trim().is_empty() {
            return Err(KcError::MissingId("to_id"));
        }

        let from_vis = endpoint_visibility(view, &input.from_id);
        let to_vis = endpoint_visibility(view, &input.to_id);
        let visibility = match (from_vis, to_vis) {
            (Some(a), Some(b)) => Visibility::most_restrictive(a, b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => Visibility::Private,
        };

        let edge = Edge {
            edge_id: ids::new_edge_id(),
            edge_type: input.edge_type,
            from_id: input.from_id,
            to_id: input.to_id,
            scope: input.scope,
            project_id: input.project_id,
            visibility,
            asserted_ts: ids::now_rfc3339(),
            source_refs: clamp_source_refs(input.source_refs, MAX_SOURCE_REFS_CLAIM),
            notes: input.notes,
            version: "v1".to_string(),
        };
        let edge_id = edge.edge_id.clone();
        storage::append_jsonl_line(&self.edges_path, &edge)?;
        Ok(edge_id)
    }
}

/// Looks up the visibility of a claim or node id in the view, whichever
/// matches.
fn endpoint_visibility(view: &View, id: &str) -> Option<Visibility> {
    view.claims_by_id
        .get(id)
        .map(|c| c.visibility)
        .or_else(|| view.nodes_by_id.get(id).map(|n| n.visibility))
}
