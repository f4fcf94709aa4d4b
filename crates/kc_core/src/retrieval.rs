//! Deterministic retrieval: the `decide_next` context builder (§4.4).
//!
//! Assembles a bounded [`Context`] from values pins, preference/goal pins,
//! query tokens, memory seeds (injected), recent nodes, and one-hop edge
//! expansion. Given the same stores and the same memory index response,
//! the result is bit-identical.

use crate::capabilities::TextIndex;
use crate::thoughtdb::types::{truncate_chars, ClaimType, EdgeType, NodeType, Scope, Status};
use crate::thoughtdb::view::{self, View};
use serde::Serialize;
use std::collections::HashSet;

/// Budget dimensions for [`build_context`], with the §4.4 defaults.
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub max_nodes: usize,
    pub max_values_claims: usize,
    pub max_pref_goal_claims: usize,
    pub max_query_claims: usize,
    pub max_edges: usize,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            max_nodes: 6,
            max_values_claims: 8,
            max_pref_goal_claims: 8,
            max_query_claims: 10,
            max_edges: 20,
        }
    }
}

const PINNED_TAGS: [&str; 3] = [
    "mi:setting:ask_when_uncertain",
    "mi:setting:refactor_intent",
    "mi:testless_verification_strategy",
];

/// A claim projected into a context, with truncated text.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedClaim {
    pub claim_id: String,
    pub claim_type: ClaimType,
    pub text: String,
    pub scope: Scope,
    pub tags: Vec<String>,
    pub confidence: f64,
    pub canonical_id: String,
}

/// A node projected into a context, with truncated title/text.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedNode {
    pub node_id: String,
    pub node_type: NodeType,
    pub title: String,
    pub text: String,
    pub scope: Scope,
    pub tags: Vec<String>,
    pub canonical_id: String,
}

/// An edge projected into a context.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedEdge {
    pub edge_id: String,
    pub edge_type: EdgeType,
    pub from_id: String,
    pub to_id: String,
    pub scope: Scope,
}

/// The bounded context returned by [`build_context`].
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub as_of_ts: String,
    pub query: String,
    pub nodes: Vec<ProjectedNode>,
    pub values_claims: Vec<ProjectedClaim>,
    pub pref_goal_claims: Vec<ProjectedClaim>,
    pub query_claims: Vec<ProjectedClaim>,
    pub edges: Vec<ProjectedEdge>,
    pub notes: Vec<String>,
}

/// Builds the bounded context consumed by the reasoning model's next turn.
#[allow(clippy::too_many_arguments)]
pub fn build_context(
    project_view: &View,
    global_view: &View,
    project_id: &str,
    as_of_ts: &str,
    task: &str,
    hands_last_message: &str,
    recent_evidence: &[serde_json::Value],
    memory_index: Option<&dyn TextIndex>,
    budgets: &Budgets,
) -> Context {
    let mut notes = Vec::new();

    let query = build_query(task, hands_last_message, recent_evidence);
    let tokens = extract_tokens(&query);

    let (claim_hits, node_hits) = match memory_index {
        Some(index) => {
            let hits = index.search(
                &query,
                budgets.max_query_claims + budgets.max_nodes,
                &["claim", "node"],
                true,
                Some(project_id),
            );
            let claim_hits: Vec<_> = hits.iter().filter(|h| h.kind == "claim").cloned().collect();
            let node_hits: Vec<_> = hits.iter().filter(|h| h.kind == "node").cloned().collect();
            (claim_hits, node_hits)
        }
        None => {
            notes.push("no text index supplied; query/token retrieval only".to_string());
            (Vec::new(), Vec::new())
        }
    };

    let as_of = view::parse_ts(as_of_ts);

    let mut seen_nodes: HashSet<String> = HashSet::new();
    let mut nodes_out: Vec<ProjectedNode> = Vec::new();

    // 5a. latest active global summary node tagged values:summary
    if let Some(id) = global_view.node_ids_by_asserted_ts_desc.iter().find(|id| {
        global_view
            .nodes_by_id
            .get(*id)
            .map(|n| n.node_type == NodeType::Summary && n.tags.iter().any(|t| t == "values:summary"))
            .unwrap_or(false)
            && global_view.node_status(id) == Status::Active
    }) {
        push_node(global_view, id, &mut seen_nodes, &mut nodes_out, budgets.max_nodes);
    }

    // 5b. up to 3 most-recent project nodes
    for id in project_view.node_ids_by_asserted_ts_desc.iter().take(3) {
        push_node(project_view, id, &mut seen_nodes, &mut nodes_out, budgets.max_nodes);
    }

    // 5c. memory-seeded nodes, project first
    for hit in node_hits.iter().filter(|h| h.scope == Scope::Project) {
        push_node(project_view, &hit.item_id, &mut seen_nodes, &mut nodes_out, budgets.max_nodes);
    }
    for hit in node_hits.iter().filter(|h| h.scope == Scope::Global) {
        push_node(global_view, &hit.item_id, &mut seen_nodes, &mut nodes_out, budgets.max_nodes);
    }

    // 5d. token-scored nodes, project preferred
    if nodes_out.len() < budgets.max_nodes {
        let mut candidates: Vec<(bool, String, i32, String)> = Vec::new();
        for (is_project, nview) in [(true, project_view), (false, global_view)] {
            for id in &nview.node_ids_by_asserted_ts_desc {
                if seen_nodes.contains(id) || nview.node_status(id) != Status::Active {
                    continue;
                }
                let node = &nview.nodes_by_id[id];
                let haystack = format!("{}\n{}", node.title, node.text).to_lowercase();
                let score = tokens.iter().filter(|t| haystack.contains(t.as_str())).count() as i32;
                if score > 0 {
                    candidates.push((is_project, id.clone(), score, node.asserted_ts.clone()));
                }
            }
        }
        candidates.sort_by(|a, b| b.2.cmp(&a.2).then(b.0.cmp(&a.0)).then(b.3.cmp(&a.3)).then(b.1.cmp(&a.1)));
        for (is_project, id, _, _) in candidates {
            if nodes_out.len() >= budgets.max_nodes {
                break;
            }
            let nview = if is_project { project_view } else { global_view };
            push_node(nview, &id, &mut seen_nodes, &mut nodes_out, budgets.max_nodes);
        }
    }

    let mut seen_claims: HashSet<String> = HashSet::new();

    // 6. values claims
    let mut values_claims = Vec::new();
    for id in &global_view.claim_ids_by_asserted_ts_desc {
        if values_claims.len() >= budgets.max_values_claims {
            break;
        }
        if !eligible_claim(global_view, id, as_of.as_ref()) {
            continue;
        }
        let claim = &global_view.claims_by_id[id];
        if !claim.tags.iter().any(|t| t == "values:base") || !claim.claim_type.is_preference_or_goal() {
            continue;
        }
        seen_claims.insert(id.clone());
        values_claims.push(project_claim(global_view, id));
    }

    // 7a. pinned pref/goal claims, project then global
    let mut pref_goal_claims = Vec::new();
    for (view_ref, _is_project) in [(project_view, true), (global_view, false)] {
        for id in &view_ref.claim_ids_by_asserted_ts_desc {
            if pref_goal_claims.len() >= budgets.max_pref_goal_claims {
                break;
            }
            if seen_claims.contains(id) || !eligible_claim(view_ref, id, as_of.as_ref()) {
                continue;
            }
            let claim = &view_ref.claims_by_id[id];
            if claim.tags.iter().any(|t| PINNED_TAGS.contains(&t.as_str())) {
                seen_claims.insert(id.clone());
                pref_goal_claims.push(project_claim(view_ref, id));
            }
        }
    }
    // 7b. filler: remaining preference/goal claims, project first
    for (view_ref, _is_project) in [(project_view, true), (global_view, false)] {
        for id in &view_ref.claim_ids_by_asserted_ts_desc {
            if pref_goal_claims.len() >= budgets.max_pref_goal_claims {
                break;
            }
            if seen_claims.contains(id) || !eligible_claim(view_ref, id, as_of.as_ref()) {
                continue;
            }
            let claim = &view_ref.claims_by_id[id];
            if !claim.claim_type.is_preference_or_goal() {
                continue;
            }
            seen_claims.insert(id.clone());
            pref_goal_claims.push(project_claim(view_ref, id));
        }
    }

    // 8a. query claims: memory-seeded first
    let mut query_claims = Vec::new();
    for hit in &claim_hits {
        if query_claims.len() >= budgets.max_query_claims {
            break;
        }
        let view_ref = if hit.scope == Scope::Project { project_view } else { global_view };
        if seen_claims.contains(&hit.item_id) || !eligible_claim(view_ref, &hit.item_id, as_of.as_ref()) {
            continue;
        }
        let claim = &view_ref.claims_by_id[&hit.item_id];
        if claim.tags.iter().any(|t| t == "values:raw") {
            continue;
        }
        seen_claims.insert(hit.item_id.clone());
        query_claims.push(project_claim(view_ref, &hit.item_id));
    }
    // 8b. token-scored fallback
    if query_claims.len() < budgets.max_query_claims {
        let mut candidates: Vec<(bool, String, i32, String)> = Vec::new();
        for (is_project, view_ref) in [(true, project_view), (false, global_view)] {
            for id in &view_ref.claim_ids_by_asserted_ts_desc {
                if seen_claims.contains(id) || !eligible_claim(view_ref, id, as_of.as_ref()) {
                    continue;
                }
                let claim = &view_ref.claims_by_id[id];
                let haystack = claim.text.to_lowercase();
                let mut score = tokens.iter().filter(|t| haystack.contains(t.as_str())).count() as i32;
                if claim.claim_type.is_preference_or_goal() {
                    score += 1;
                }
                if score > 0 {
                    candidates.push((is_project, id.clone(), score, claim.asserted_ts.clone()));
                }
            }
        }
        candidates.sort_by(|a, b| b.2.cmp(&a.2).then(b.0.cmp(&a.0)).then(b.3.cmp(&a.3)).then(b.1.cmp(&a.1)));
        for (is_project, id, _, _) in candidates {
            if query_claims.len() >= budgets.max_query_claims {
                break;
            }
            let view_ref = if is_project { project_view } else { global_view };
            seen_claims.insert(id.clone());
            query_claims.push(project_claim(view_ref, &id));
        }
    }

    // 9. one-hop expansion into whichever bucket has remaining budget.
    let total_claim_cap = budgets.max_values_claims + budgets.max_pref_goal_claims + budgets.max_query_claims;
    let mut remaining_claim_budget = total_claim_cap
        .saturating_sub(values_claims.len() + pref_goal_claims.len() + query_claims.len());
    let mut remaining_node_budget = budgets.max_nodes.saturating_sub(nodes_out.len());

    if remaining_claim_budget > 0 || remaining_node_budget > 0 {
        let frontier: Vec<String> = seen_nodes.iter().chain(seen_claims.iter()).cloned().collect();
        'frontier: for id in &frontier {
            for view_ref in [project_view, global_view] {
                for edge in view_ref.edges_touching(id) {
                    if !EdgeType::retrieval_expansion_types().contains(&edge.edge_type) {
                        continue;
                    }
                    if remaining_claim_budget == 0 && remaining_node_budget == 0 {
                        break 'frontier;
                    }
                    let neighbor = if &edge.from_id == id { &edge.to_id } else { &edge.from_id };
                    if seen_nodes.contains(neighbor) || seen_claims.contains(neighbor) {
                        continue;
                    }
                    let neighbor_view = match edge.scope {
                        Scope::Project => project_view,
                        Scope::Global => global_view,
                    };
                    if neighbor_view.claims_by_id.contains_key(neighbor) {
                        if remaining_claim_budget == 0 || !eligible_claim(neighbor_view, neighbor, as_of.as_ref()) {
                            continue;
                        }
                        seen_claims.insert(neighbor.clone());
                        query_claims.push(project_claim(neighbor_view, neighbor));
                        remaining_claim_budget -= 1;
                    } else if neighbor_view.nodes_by_id.contains_key(neighbor) {
                        if remaining_node_budget == 0 || neighbor_view.node_status(neighbor) != Status::Active {
                            continue;
                        }
                        if push_node(neighbor_view, neighbor, &mut seen_nodes, &mut nodes_out, usize::MAX) {
                            remaining_node_budget -= 1;
                        }
                    }
                }
            }
        }
    }

    // 10. edge selection
    let mut endpoint_set: HashSet<String> = seen_nodes.union(&seen_claims).cloned().collect();
    let recent_event_ids: Vec<String> = {
        let tail_start = recent_evidence.len().saturating_sub(12);
        recent_evidence[tail_start..]
            .iter()
            .filter_map(|e| e.get("event_id").and_then(|v| v.as_str()).map(String::from))
            .collect()
    };
    endpoint_set.extend(recent_event_ids);

    let mut edges_out = Vec::new();
    let mut seen_edge_keys: HashSet<(Scope, EdgeType, String, String)> = HashSet::new();
    'edges: for view_ref in [project_view, global_view] {
        for edge in &view_ref.edges {
            if edges_out.len() >= budgets.max_edges {
                break 'edges;
            }
            if !endpoint_set.contains(&edge.from_id) || !endpoint_set.contains(&edge.to_id) {
                continue;
            }
            let key = (edge.scope, edge.edge_type, edge.from_id.clone(), edge.to_id.clone());
            if !seen_edge_keys.insert(key) {
                continue;
            }
            edges_out.push(ProjectedEdge {
                edge_id: edge.edge_id.clone(),
                edge_type: edge.edge_type,
                from_id: edge.from_id.clone(),
                to_id: edge.to_id.clone(),
                scope: edge.scope,
            });
        }
    }

    Context {
        as_of_ts: as_of_ts.to_string(),
        query: truncate_chars(&query, 1200),
        nodes: nodes_out,
        values_claims,
        pref_goal_claims,
        query_claims,
        edges: edges_out,
        notes,
    }
}

fn eligible_claim(view: &View, id: &str, as_of: Option<&chrono::DateTime<chrono::Utc>>) -> bool {
    if view.claim_status(id) != Status::Active || view.redirects_same_as.contains_key(id) {
        return false;
    }
    let claim = match view.claims_by_id.get(id) {
        Some(c) => c,
        None => return false,
    };
    match as_of {
        Some(as_of) => view::temporally_valid(claim.valid_from.as_deref(), claim.valid_to.as_deref(), as_of),
        None => true,
    }
}

fn project_claim(view: &View, id: &str) -> ProjectedClaim {
    let claim = &view.claims_by_id[id];
    ProjectedClaim {
        claim_id: id.to_string(),
        claim_type: claim.claim_type,
        text: truncate_chars(&claim.text, 480),
        scope: claim.scope,
        tags: claim.tags.clone(),
        confidence: claim.confidence,
        canonical_id: view.resolve_id(id),
    }
}

fn push_node(
    view: &View,
    node_id: &str,
    seen: &mut HashSet<String>,
    out: &mut Vec<ProjectedNode>,
    cap: usize,
) -> bool {
    if out.len() >= cap || seen.contains(node_id) {
        return false;
    }
    if view.node_status(node_id) != Status::Active || view.redirects_same_as.contains_key(node_id) {
        return false;
    }
    let node = match view.nodes_by_id.get(node_id) {
        Some(n) => n,
        None => return false,
    };
    seen.insert(node_id.to_string());
    out.push(ProjectedNode {
        node_id: node_id.to_string(),
        node_type: node.node_type,
        title: truncate_chars(&node.title, 160),
        text: truncate_chars(&node.text, 560),
        scope: node.scope,
        tags: node.tags.clone(),
        canonical_id: view.resolve_id(node_id),
    });
    true
}

fn build_query(task: &str, hands_last_message: &str, recent_evidence: &[serde_json::Value]) -> String {
    let mut parts = vec![task.to_string(), hands_last_message.to_string()];
    let tail_start = recent_evidence.len().saturating_sub(6);
    for event in &recent_evidence[tail_start..] {
        if event.get("kind").and_then(|v| v.as_str()) != Some("evidence") {
            continue;
        }
        for (key, limit) in [("unknowns", 6), ("risk_signals", 6), ("facts", 6), ("results", 4)] {
            if let Some(items) = event.get(key).and_then(|v| v.as_array()) {
                for item in items.iter().take(limit) {
                    if let Some(s) = item.as_str() {
                        parts.push(s.to_string());
                    }
                }
            }
        }
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

/// Case-folded alphanumeric tokens of length >= 2, deduped, capped at 18.
fn extract_tokens(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars().chain(std::iter::once(' ')) {
        if tokens.len() >= 18 {
            break;
        }
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            if current.chars().count() >= 2 && seen.insert(current.clone()) {
                tokens.push(current.clone());
            }
            current.clear();
        }
    }
    tokens
}
