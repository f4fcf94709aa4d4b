//! The materialized read-model (`View`) for one ThoughtDB scope.

use super::types::{Claim, ClaimRecord, Edge, EdgeType, Node, NodeRecord, Scope, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Maximum hops followed when resolving a `same_as` redirect chain
/// (invariant 6).
pub const MAX_REDIRECT_HOPS: u32 = 20;

/// A claim projected for iteration, annotated with derived status and
/// canonical id.
#[derive(Debug, Clone)]
pub struct ClaimView {
    pub claim: Claim,
    pub status: Status,
    pub canonical_id: String,
}

/// A node projected for iteration, annotated with derived status and
/// canonical id.
#[derive(Debug, Clone)]
pub struct NodeView {
    pub node: Node,
    pub status: Status,
    pub canonical_id: String,
}

/// Immutable materialized read-model of one ThoughtDB scope.
///
/// Built once per distinct set of source file `(size, mtime_ns)` tuples
/// (see `snapshot.rs`); cheap to clone-share since the id-keyed maps and
/// the derived indices reference the same underlying records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct View {
    pub scope_name: String,
    pub project_id: String,

    pub claims_by_id: HashMap<String, Claim>,
    pub retracted_ids: HashSet<String>,
    pub claims_by_tag: HashMap<String, HashSet<String>>,
    pub claim_ids_by_asserted_ts_desc: Vec<String>,

    pub nodes_by_id: HashMap<String, Node>,
    pub retracted_node_ids: HashSet<String>,
    pub nodes_by_tag: HashMap<String, HashSet<String>>,
    pub node_ids_by_asserted_ts_desc: Vec<String>,

    pub edges: Vec<Edge>,
    pub edges_by_from: HashMap<String, Vec<usize>>,
    pub edges_by_to: HashMap<String, Vec<usize>>,
    pub redirects_same_as: HashMap<String, String>,
    pub superseded_ids: HashSet<String>,
}

impl View {
    /// Builds a View by streaming the three JSONL files' raw lines.
    ///
    /// Lines that fail to parse, or whose `kind` isn't recognized, are
    /// silently ignored (§6.2: "View materialization simply ignores
    /// them" — only compaction enforces the unknown-kind invariant).
    pub fn build(
        scope_name: impl Into<String>,
        project_id: impl Into<String>,
        claim_lines: &[String],
        node_lines: &[String],
        edge_lines: &[String],
    ) -> Self {
        let mut view = View {
            scope_name: scope_name.into(),
            project_id: project_id.into(),
            ..Default::default()
        };

        for line in claim_lines {
            match serde_json::from_str::<ClaimRecord>(line) {
                Ok(ClaimRecord::Claim(claim)) => {
                    for tag in &claim.tags {
                        view.claims_by_tag
                            .entry(tag.clone())
                            .or_default()
                            .insert(claim.claim_id.clone());
                    }
                    view.claims_by_id.insert(claim.claim_id.clone(), claim);
                }
                Ok(ClaimRecord::ClaimRetract(retract)) => {
                    view.retracted_ids.insert(retract.claim_id);
                }
                Err(_) => continue,
            }
        }

        for line in node_lines {
            match serde_json::from_str::<NodeRecord>(line) {
                Ok(NodeRecord::Node(node)) => {
                    for tag in &node.tags {
                        view.nodes_by_tag
                            .entry(tag.clone())
                            .or_default()
                            .insert(node.node_id.clone());
                    }
                    view.nodes_by_id.insert(node.node_id.clone(), node);
                }
                Ok(NodeRecord::NodeRetract(retract)) => {
                    view.retracted_node_ids.insert(retract.node_id);
                }
                Err(_) => continue,
            }
        }

        for line in edge_lines {
            if let Ok(edge) = serde_json::from_str::<Edge>(line) {
                let idx = view.edges.len();
                view.edges_by_from
                    .entry(edge.from_id.clone())
                    .or_default()
                    .push(idx);
                view.edges_by_to
                    .entry(edge.to_id.clone())
                    .or_default()
                    .push(idx);
                if edge.edge_type == EdgeType::SameAs {
                    view.redirects_same_as
                        .insert(edge.from_id.clone(), edge.to_id.clone());
                }
                if edge.edge_type == EdgeType::Supersedes {
                    view.superseded_ids.insert(edge.from_id.clone());
                }
                view.edges.push(edge);
            }
        }

        view.claim_ids_by_asserted_ts_desc = sorted_ids_desc(
            view.claims_by_id.values().map(|c| (c.claim_id.clone(), c.asserted_ts.clone())),
        );
        view.node_ids_by_asserted_ts_desc = sorted_ids_desc(
            view.nodes_by_id.values().map(|n| (n.node_id.clone(), n.asserted_ts.clone())),
        );

        view
    }

    /// Follows `same_as` redirects from `id`, breaking cycles at
    /// [`MAX_REDIRECT_HOPS`] hops. Returns `id` itself if there is no
    /// redirect.
    pub fn resolve_id(&self, id: &str) -> String {
        let mut current = id.to_string();
        let mut visited = HashSet::new();
        for _ in 0..MAX_REDIRECT_HOPS {
            if !visited.insert(current.clone()) {
                break;
            }
            match self.redirects_same_as.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Status of a claim id: `retracted` > `superseded` > `active`;
    /// `unknown` if the id isn't present.
    pub fn claim_status(&self, id: &str) -> Status {
        if !self.claims_by_id.contains_key(id) {
            return Status::Unknown;
        }
        if self.retracted_ids.contains(id) {
            return Status::Retracted;
        }
        if self.superseded_ids.contains(id) {
            return Status::Superseded;
        }
        Status::Active
    }

    /// Status of a node id, mirroring [`View::claim_status`].
    pub fn node_status(&self, id: &str) -> Status {
        if !self.nodes_by_id.contains_key(id) {
            return Status::Unknown;
        }
        if self.retracted_node_ids.contains(id) {
            return Status::Retracted;
        }
        if self.superseded_ids.contains(id) {
            return Status::Superseded;
        }
        Status::Active
    }

    /// Iterates claims, newest-first, applying the filters from §4.2.
    pub fn iter_claims(
        &self,
        include_inactive: bool,
        include_aliases: bool,
        as_of_ts: Option<&str>,
    ) -> Vec<ClaimView> {
        let as_of = as_of_ts.and_then(parse_ts);
        let mut out = Vec::new();
        for id in &self.claim_ids_by_asserted_ts_desc {
            let claim = match self.claims_by_id.get(id) {
                Some(c) => c,
                None => continue,
            };
            let status = self.claim_status(id);
            if !include_inactive && status != Status::Active {
                continue;
            }
            if !include_aliases && self.redirects_same_as.contains_key(id) {
                continue;
            }
            if let Some(as_of) = as_of {
                if !temporally_valid(claim.valid_from.as_deref(), claim.valid_to.as_deref(), &as_of) {
                    continue;
                }
            }
            out.push(ClaimView {
                claim: claim.clone(),
                status,
                canonical_id: self.resolve_id(id),
            });
        }
        out
    }

    /// Iterates nodes, newest-first, applying the filters from §4.2.
    /// Nodes have no temporal validity window.
    pub fn iter_nodes(&self, include_inactive: bool, include_aliases: bool) -> Vec<NodeView> {
        let mut out = Vec::new();
        for id in &self.node_ids_by_asserted_ts_desc {
            let node = match self.nodes_by_id.get(id) {
                Some(n) => n,
                None => continue,
            };
            let status = self.node_status(id);
            if !include_inactive && status != Status::Active {
                continue;
            }
            if !include_aliases && self.redirects_same_as.contains_key(id) {
                continue;
            }
            out.push(NodeView {
                node: node.clone(),
                status,
                canonical_id: self.resolve_id(id),
            });
        }
        out
    }

    /// Edges whose `from_id` or `to_id` is `id`.
    pub fn edges_touching(&self, id: &str) -> Vec<&Edge> {
        let mut indices: Vec<usize> = Vec::new();
        if let Some(v) = self.edges_by_from.get(id) {
            indices.extend(v);
        }
        if let Some(v) = self.edges_by_to.get(id) {
            indices.extend(v);
        }
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|i| &self.edges[i]).collect()
    }
}

/// Parses an RFC3339 timestamp; returns `None` on failure (treated as "no
/// constraint" by callers, since malformed timestamps shouldn't silently
/// exclude otherwise-valid records).
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

/// True iff `as_of` falls within `[valid_from, valid_to)` (invariant 7).
pub fn temporally_valid(valid_from: Option<&str>, valid_to: Option<&str>, as_of: &DateTime<Utc>) -> bool {
    if let Some(vf) = valid_from {
        if let Some(vf_ts) = parse_ts(vf) {
            if vf_ts > *as_of {
                return false;
            }
        }
    }
    if let Some(vt) = valid_to {
        if let Some(vt_ts) = parse_ts(vt) {
            if *as_of >= vt_ts {
                return false;
            }
        }
    }
    true
}

fn sorted_ids_desc(items: impl Iterator<Item = (String, String)>) -> Vec<String> {
    let mut items: Vec<(String, String)> = items.collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    items.into_iter().map(|(id, _)| id).collect()
}
