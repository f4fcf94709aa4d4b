//! Bounded subgraph extraction around a root id (§4.6): depth-capped BFS
//! with direction, edge-type, and alias controls.

use crate::thoughtdb::types::{truncate_chars, EdgeType, Status};
use crate::thoughtdb::view::{self, View};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Which direction to walk edges relative to the frontier id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
    Both,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

/// Which view(s) to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSelector {
    Project,
    Global,
    Effective,
}

/// A claim or node emitted into a [`Subgraph`], whichever kind matches the id.
#[derive(Debug, Clone, Serialize)]
pub struct SubgraphClaim {
    pub claim_id: String,
    pub text: String,
    pub status: Status,
    pub canonical_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubgraphNode {
    pub node_id: String,
    pub title: String,
    pub status: Status,
    pub canonical_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubgraphEdge {
    pub edge_id: String,
    pub edge_type: EdgeType,
    pub from_id: String,
    pub to_id: String,
}

/// Result of [`build_subgraph`]. Echoes every input parameter alongside the
/// extracted data so callers don't have to thread the request through
/// separately to interpret the response.
#[derive(Debug, Clone, Serialize)]
pub struct Subgraph {
    pub root_id: String,
    pub root_id_canonical: String,
    pub depth: u32,
    pub direction: Direction,
    pub edge_types: Vec<EdgeType>,
    pub include_inactive: bool,
    pub include_aliases: bool,
    pub as_of_ts: Option<String>,
    pub claims: Vec<SubgraphClaim>,
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<SubgraphEdge>,
    pub missing_ids: Vec<String>,
}

/// Walks a bounded BFS from `root_id` out to `depth` hops (capped at 6).
#[allow(clippy::too_many_arguments)]
pub fn build_subgraph(
    project_view: &View,
    global_view: &View,
    selector: ViewSelector,
    root_id: &str,
    depth: u32,
    direction: Direction,
    edge_types: &[EdgeType],
    include_inactive: bool,
    include_aliases: bool,
    as_of_ts: Option<&str>,
) -> Subgraph {
    let depth = depth.min(6);
    let as_of = as_of_ts.and_then(view::parse_ts);

    let root_canonical = if include_aliases {
        root_id.to_string()
    } else {
        canonical_in(project_view, global_view, selector, root_id)
    };

    let mut included: HashSet<String> = HashSet::new();
    let mut missing: Vec<String> = Vec::new();
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();

    if exists_anywhere(project_view, global_view, selector, &root_canonical) {
        included.insert(root_canonical.clone());
        queue.push_back((root_canonical.clone(), 0));
    } else {
        missing.push(root_canonical.clone());
    }

    while let Some((current, current_depth)) = queue.pop_front() {
        if current_depth >= depth {
            continue;
        }
        let alias_keys = alias_keys_for(project_view, global_view, selector, &current, include_aliases);

        for key in &alias_keys {
            for edge in edges_touching(project_view, global_view, selector, key) {
                if !edge_types.is_empty() && !edge_types.contains(&edge.edge_type) {
                    continue;
                }
                let neighbor = match (direction, &edge.from_id == key) {
                    (Direction::Out, true) => Some(edge.to_id.clone()),
                    (Direction::In, false) => Some(edge.from_id.clone()),
                    (Direction::Both, true) => Some(edge.to_id.clone()),
                    (Direction::Both, false) => Some(edge.from_id.clone()),
                    _ => None,
                };
                let neighbor = match neighbor {
                    Some(n) => n,
                    None => continue,
                };
                let neighbor_canonical = if include_aliases {
                    neighbor.clone()
                } else {
                    canonical_in(project_view, global_view, selector, &neighbor)
                };

                if included.contains(&neighbor_canonical) {
                    continue;
                }
                if !passes_active_valid_filter(
                    project_view,
                    global_view,
                    selector,
                    &neighbor_canonical,
                    include_inactive,
                    as_of.as_ref(),
                ) {
                    continue;
                }
                if !exists_anywhere(project_view, global_view, selector, &neighbor_canonical) {
                    missing.push(neighbor_canonical);
                    continue;
                }
                included.insert(neighbor_canonical.clone());
                queue.push_back((neighbor_canonical, current_depth + 1));
            }
        }
    }

    let mut claims = Vec::new();
    let mut nodes = Vec::new();
    for id in &included {
        if let Some((v, claim)) = find_claim(project_view, global_view, selector, id) {
            claims.push(SubgraphClaim {
                claim_id: id.clone(),
                text: truncate_chars(&claim.text, 480),
                status: v.claim_status(id),
                canonical_id: v.resolve_id(id),
            });
        } else if let Some((v, node)) = find_node(project_view, global_view, selector, id) {
            nodes.push(SubgraphNode {
                node_id: id.clone(),
                title: truncate_chars(&node.title, 160),
                status: v.node_status(id),
                canonical_id: v.resolve_id(id),
            });
        }
    }
    claims.sort_by(|a, b| b.claim_id.cmp(&a.claim_id));
    nodes.sort_by(|a, b| b.node_id.cmp(&a.node_id));

    let mut edges_out = Vec::new();
    let mut seen_edges = HashSet::new();
    for id in &included {
        for edge in edges_touching(project_view, global_view, selector, id) {
            let (from, to) = if include_aliases {
                (edge.from_id.clone(), edge.to_id.clone())
            } else {
                (
                    canonical_in(project_view, global_view, selector, &edge.from_id),
                    canonical_in(project_view, global_view, selector, &edge.to_id),
                )
            };
            if !included.contains(&from) || !included.contains(&to) {
                continue;
            }
            if !edge_types.is_empty() && !edge_types.contains(&edge.edge_type) {
                continue;
            }
            if seen_edges.insert(edge.edge_id.clone()) {
                edges_out.push(SubgraphEdge {
                    edge_id: edge.edge_id.clone(),
                    edge_type: edge.edge_type,
                    from_id: from,
                    to_id: to,
                });
            }
        }
    }
    edges_out.sort_by(|a, b| b.edge_id.cmp(&a.edge_id));
    missing.sort();
    missing.dedup();

    Subgraph {
        root_id: root_id.to_string(),
        root_id_canonical: root_canonical,
        depth,
        direction,
        edge_types: edge_types.to_vec(),
        include_inactive,
        include_aliases,
        as_of_ts: as_of_ts.map(str::to_string),
        claims,
        nodes,
        edges: edges_out,
        missing_ids: missing,
    }
}

fn each_active_view<'a>(
    project_view: &'a View,
    global_view: &'a View,
    selector: ViewSelector,
) -> Vec<&'a View> {
    match selector {
        ViewSelector::Project => vec![project_view],
        ViewSelector::Global => vec![global_view],
        ViewSelector::Effective => vec![project_view, global_view],
    }
}

fn canonical_in(project_view: &View, global_view: &View, selector: ViewSelector, id: &str) -> String {
    for v in each_active_view(project_view, global_view, selector) {
        if v.claims_by_id.contains_key(id) || v.nodes_by_id.contains_key(id) {
            return v.resolve_id(id);
        }
    }
    id.to_string()
}

fn exists_anywhere(project_view: &View, global_view: &View, selector: ViewSelector, id: &str) -> bool {
    each_active_view(project_view, global_view, selector)
        .iter()
        .any(|v| v.claims_by_id.contains_key(id) || v.nodes_by_id.contains_key(id))
}

fn find_claim<'a>(
    project_view: &'a View,
    global_view: &'a View,
    selector: ViewSelector,
    id: &str,
) -> Option<(&'a View, &'a crate::thoughtdb::types::Claim)> {
    each_active_view(project_view, global_view, selector)
        .into_iter()
        .find_map(|v| v.claims_by_id.get(id).map(|c| (v, c)))
}

fn find_node<'a>(
    project_view: &'a View,
    global_view: &'a View,
    selector: ViewSelector,
    id: &str,
) -> Option<(&'a View, &'a crate::thoughtdb::types::Node)> {
    each_active_view(project_view, global_view, selector)
        .into_iter()
        .find_map(|v| v.nodes_by_id.get(id).map(|n| (v, n)))
}

fn edges_touching<'a>(
    project_view: &'a View,
    global_view: &'a View,
    selector: ViewSelector,
    id: &str,
) -> Vec<&'a crate::thoughtdb::types::Edge> {
    let mut out = Vec::new();
    for v in each_active_view(project_view, global_view, selector) {
        out.extend(v.edges_touching(id));
    }
    out
}

/// The set of ids whose incident edges should be walked for `id`: just
/// `{id}` if aliases are included directly, otherwise the canonical id plus
/// every alias that redirects to it.
fn alias_keys_for(
    project_view: &View,
    global_view: &View,
    selector: ViewSelector,
    id: &str,
    include_aliases: bool,
) -> Vec<String> {
    if include_aliases {
        return vec![id.to_string()];
    }
    let mut keys = vec![id.to_string()];
    for v in each_active_view(project_view, global_view, selector) {
        for (alias, target) in &v.redirects_same_as {
            if target == id && !keys.contains(alias) {
                keys.push(alias.clone());
            }
        }
    }
    keys
}

fn passes_active_valid_filter(
    project_view: &View,
    global_view: &View,
    selector: ViewSelector,
    id: &str,
    include_inactive: bool,
    as_of: Option<&chrono::DateTime<chrono::Utc>>,
) -> bool {
    if include_inactive {
        return true;
    }
    if let Some((v, claim)) = find_claim(project_view, global_view, selector, id) {
        if v.claim_status(id) != Status::Active {
            return false;
        }
        if let Some(as_of) = as_of {
            return view::temporally_valid(claim.valid_from.as_deref(), claim.valid_to.as_deref(), as_of);
        }
        return true;
    }
    if let Some((v, _node)) = find_node(project_view, global_view, selector, id) {
        return v.node_status(id) == Status::Active;
    }
    true
}
