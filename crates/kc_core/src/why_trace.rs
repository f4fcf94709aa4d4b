//! WhyTrace: provenance justification for an evidence event (§4.5).
//!
//! Collects candidate claims for a target event, asks an injected
//! [`MindProvider`] which of them the event actually depends on, and
//! materializes `depends_on` edges from the event to the chosen claims.

use crate::capabilities::{MindProvider, TextIndex};
use crate::error::Result;
use crate::ids;
use crate::storage;
use crate::thoughtdb::types::{Claim, Edge, EdgeType, Scope, SourceRef, Status, Visibility};
use crate::thoughtdb::view::{self, View};
use crate::thoughtdb::Store;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Tuning knobs for [`run_why_trace`], with the §4.5 defaults.
#[derive(Debug, Clone, Copy)]
pub struct WhyTraceConfig {
    pub top_k: usize,
    pub min_write_confidence: f64,
}

impl Default for WhyTraceConfig {
    fn default() -> Self {
        Self {
            top_k: 12,
            min_write_confidence: 0.7,
        }
    }
}

/// The outcome of one WhyTrace run.
#[derive(Debug, Clone)]
pub struct WhyTraceResult {
    pub obj: serde_json::Value,
    pub transcript_path: PathBuf,
    pub written_edge_ids: Vec<String>,
}

#[derive(Debug, Clone)]
struct Candidate {
    claim_id: String,
    visibility: Visibility,
}

struct Hints {
    claim_ids: Vec<String>,
    node_ids: Vec<String>,
}

/// Runs WhyTrace for `event` against `project_view`/`global_view`, writing
/// `depends_on` edges into `store` when `write_edges_from_event_id` is
/// supplied and the model's verdict clears the confidence bar.
#[allow(clippy::too_many_arguments)]
pub fn run_why_trace(
    project_view: &View,
    global_view: &View,
    event: &serde_json::Value,
    query: &str,
    memory_index: Option<&dyn TextIndex>,
    mind: &dyn MindProvider,
    store: &Store,
    write_edges_from_event_id: Option<&str>,
    config: &WhyTraceConfig,
) -> Result<WhyTraceResult> {
    let candidates = build_candidates(project_view, global_view, event, query, memory_index, config.top_k);
    let candidate_ids: HashSet<String> = candidates.iter().map(|c| c.claim_id.clone()).collect();
    let candidates_by_id: HashMap<&str, &Candidate> =
        candidates.iter().map(|c| (c.claim_id.as_str(), c)).collect();

    let prompt = build_prompt(event, query, &candidates);
    let response = mind.call("why_trace.schema.json", &prompt, "why_trace")?;
    let mut obj = response.obj;

    let chosen: Vec<String> = obj
        .get("chosen_claim_ids")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).map(String::from).collect())
        .unwrap_or_default();
    let mut filtered: Vec<String> = chosen.into_iter().filter(|id| candidate_ids.contains(id)).collect();
    filtered.truncate(10);

    let reported_status = obj.get("status").and_then(|v| v.as_str()).unwrap_or("insufficient");
    let status = if filtered.is_empty() { "insufficient".to_string() } else { reported_status.to_string() };
    let confidence = obj.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);

    if let Some(map) = obj.as_object_mut() {
        map.insert(
            "chosen_claim_ids".to_string(),
            serde_json::Value::Array(filtered.iter().cloned().map(serde_json::Value::String).collect()),
        );
        map.insert("status".to_string(), serde_json::Value::String(status.clone()));
    }

    let mut written_edge_ids = Vec::new();
    if let Some(event_id) = write_edges_from_event_id.filter(|e| !e.is_empty()) {
        if status == "ok" && confidence >= config.min_write_confidence {
            for claim_id in &filtered {
                let source_visibility = candidates_by_id
                    .get(claim_id.as_str())
                    .map(|c| c.visibility)
                    .unwrap_or(Visibility::Project);
                let edge_visibility = if source_visibility == Visibility::Private {
                    Visibility::Private
                } else {
                    Visibility::Project
                };
                let edge = Edge {
                    edge_id: ids::new_edge_id(),
                    edge_type: EdgeType::DependsOn,
                    from_id: event_id.to_string(),
                    to_id: claim_id.clone(),
                    scope: Scope::Project,
                    project_id: project_view.project_id.clone(),
                    visibility: edge_visibility,
                    asserted_ts: ids::now_rfc3339(),
                    source_refs: vec![SourceRef::evidence_event(event_id)],
                    notes: "why_trace materialized".to_string(),
                    version: "v1".to_string(),
                };
                storage::append_jsonl_line(&store.edges_path, &edge)?;
                written_edge_ids.push(edge.edge_id);
            }
        }
    }

    Ok(WhyTraceResult {
        obj,
        transcript_path: response.transcript_path,
        written_edge_ids,
    })
}

fn extract_hints(event: &serde_json::Value) -> Hints {
    let thought_db = event.get("thought_db");
    let mut claim_ids = Vec::new();
    let mut seen = HashSet::new();
    if let Some(td) = thought_db {
        for key in ["values_claim_ids", "pref_goal_claim_ids", "query_claim_ids"] {
            if let Some(arr) = td.get(key).and_then(|v| v.as_array()) {
                for item in arr.iter().filter_map(|v| v.as_str()) {
                    if seen.insert(item.to_string()) {
                        claim_ids.push(item.to_string());
                    }
                }
            }
        }
    }
    let mut node_ids = Vec::new();
    let mut seen_nodes = HashSet::new();
    if let Some(td) = thought_db {
        if let Some(arr) = td.get("node_ids").and_then(|v| v.as_array()) {
            for item in arr.iter().filter_map(|v| v.as_str()) {
                if seen_nodes.insert(item.to_string()) {
                    node_ids.push(item.to_string());
                }
            }
        }
    }
    Hints { claim_ids, node_ids }
}

fn find_claim<'a>(project_view: &'a View, global_view: &'a View, id: &str) -> Option<(&'a View, &'a Claim)> {
    if let Some(c) = project_view.claims_by_id.get(id) {
        return Some((project_view, c));
    }
    if let Some(c) = global_view.claims_by_id.get(id) {
        return Some((global_view, c));
    }
    None
}

fn build_candidates(
    project_view: &View,
    global_view: &View,
    event: &serde_json::Value,
    query: &str,
    memory_index: Option<&dyn TextIndex>,
    top_k: usize,
) -> Vec<Candidate> {
    let hints = extract_hints(event);
    let now = chrono::Utc::now();
    let event_id = event.get("event_id").and_then(|v| v.as_str()).unwrap_or("");

    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    // a. hint claims first
    for id in &hints.claim_ids {
        if candidates.len() >= top_k {
            break;
        }
        if let Some((v, claim)) = find_claim(project_view, global_view, id) {
            if v.claim_status(id) == Status::Active
                && view::temporally_valid(claim.valid_from.as_deref(), claim.valid_to.as_deref(), &now)
                && seen.insert(id.clone())
            {
                candidates.push(Candidate {
                    claim_id: id.clone(),
                    visibility: claim.visibility,
                });
            }
        }
    }

    // b. claims directly citing the event
    if !event_id.is_empty() {
        'direct: for v in [project_view, global_view] {
            for id in &v.claim_ids_by_asserted_ts_desc {
                if candidates.len() >= top_k {
                    break 'direct;
                }
                if seen.contains(id) {
                    continue;
                }
                let claim = &v.claims_by_id[id];
                if v.claim_status(id) == Status::Active
                    && claim.source_refs.iter().any(|r| r.event_id == event_id)
                {
                    seen.insert(id.clone());
                    candidates.push(Candidate {
                        claim_id: id.clone(),
                        visibility: claim.visibility,
                    });
                }
            }
        }
    }

    // c. one-hop expansion from hints ∪ event_id
    let mut frontier: Vec<String> = hints.claim_ids.clone();
    frontier.extend(hints.node_ids.clone());
    if !event_id.is_empty() {
        frontier.push(event_id.to_string());
    }
    'expand: for id in &frontier {
        for v in [project_view, global_view] {
            for edge in v.edges_touching(id) {
                if candidates.len() >= top_k {
                    break 'expand;
                }
                let neighbor = if &edge.from_id == id { &edge.to_id } else { &edge.from_id };
                if seen.contains(neighbor) {
                    continue;
                }
                if let Some((nview, claim)) = find_claim(project_view, global_view, neighbor) {
                    if nview.claim_status(neighbor) == Status::Active
                        && view::temporally_valid(claim.valid_from.as_deref(), claim.valid_to.as_deref(), &now)
                    {
                        seen.insert(neighbor.clone());
                        candidates.push(Candidate {
                            claim_id: neighbor.clone(),
                            visibility: claim.visibility,
                        });
                    }
                }
            }
        }
    }

    // d. memory FTS backfill
    if candidates.len() < top_k {
        if let Some(index) = memory_index {
            let hits = index.search(query, top_k - candidates.len(), &["claim"], true, None);
            for hit in hits {
                if candidates.len() >= top_k {
                    break;
                }
                if seen.contains(&hit.item_id) {
                    continue;
                }
                let v = if hit.scope == Scope::Project { project_view } else { global_view };
                if let Some(claim) = v.claims_by_id.get(&hit.item_id) {
                    if v.claim_status(&hit.item_id) == Status::Active {
                        seen.insert(hit.item_id.clone());
                        candidates.push(Candidate {
                            claim_id: hit.item_id,
                            visibility: claim.visibility,
                        });
                    }
                }
            }
        }
    }

    candidates
}

/// Derives a query string from a target evidence event (§4.5's "a query
/// derived from `E`"). Events with `kind == "evidence"`, or no `kind` at all
/// but carrying `facts`/`results`/`unknowns`, contribute a bounded prefix of
/// those fields; other known kinds get a kind-specific summary; anything
/// else falls back to a truncated dump of the whole object.
pub fn query_from_event(event: &serde_json::Value) -> String {
    let kind = event.get("kind").and_then(|v| v.as_str()).unwrap_or("");
    let looks_evidence = kind == "evidence"
        || (kind.is_empty()
            && (event.get("facts").is_some() || event.get("results").is_some() || event.get("unknowns").is_some()));

    if looks_evidence {
        let mut parts = Vec::new();
        parts.extend(string_array(event, "facts", 6));
        parts.extend(string_array(event, "results", 6));
        parts.extend(string_array(event, "unknowns", 4));
        return parts.join(" ").trim().to_string();
    }

    match kind {
        "decide_next" => [
            event.get("status").and_then(|v| v.as_str()).unwrap_or(""),
            event.get("next_action").and_then(|v| v.as_str()).unwrap_or(""),
            event.get("notes").and_then(|v| v.as_str()).unwrap_or(""),
            event.get("next_hands_input").and_then(|v| v.as_str()).unwrap_or(""),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" "),
        "hands_input" => event.get("input").and_then(|v| v.as_str()).unwrap_or("").trim().to_string(),
        "workflow_trigger" => [
            event.get("workflow_name").and_then(|v| v.as_str()).unwrap_or(""),
            event.get("trigger_pattern").and_then(|v| v.as_str()).unwrap_or(""),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" "),
        _ => {
            let dump = serde_json::to_string(event).unwrap_or_default();
            truncate_chars(&dump, 1400)
        }
    }
}

fn string_array(event: &serde_json::Value, key: &str, limit: usize) -> Vec<String> {
    event
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .take(limit)
                .collect()
        })
        .unwrap_or_default()
}

fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let mut out: String = s.chars().take(limit.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn build_prompt(event: &serde_json::Value, query: &str, candidates: &[Candidate]) -> String {
    let ids: Vec<&str> = candidates.iter().map(|c| c.claim_id.as_str()).collect();
    format!(
        "event: {}\nquery: {}\ncandidate_claim_ids: {}",
        event.get("event_id").and_then(|v| v.as_str()).unwrap_or(""),
        query,
        ids.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::MindResponse;
    use crate::thoughtdb::store::{ClaimWriteOutcome, NewClaim, Store};
    use crate::thoughtdb::types::{ClaimType, Visibility};
    use serde_json::json;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> Store {
        Store::new(
            tmp.path().join("claims.jsonl"),
            tmp.path().join("nodes.jsonl"),
            tmp.path().join("edges.jsonl"),
        )
    }

    #[test]
    fn materializes_depends_on_edges_when_confident() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        let empty = View::build("project", "p1", &[], &[], &[]);
        let claim_id = match s
            .create_claim(
                &empty,
                NewClaim {
                    claim_type: ClaimType::Fact,
                    text: "the deploy key rotates weekly".to_string(),
                    scope: Scope::Project,
                    project_id: "p1".to_string(),
                    visibility: Visibility::Project,
                    valid_from: None,
                    valid_to: None,
                    tags: vec![],
                    source_refs: vec![],
                    confidence: 1.0,
                    notes: String::new(),
                },
            )
            .unwrap()
        {
            ClaimWriteOutcome::Created(id) => id,
            _ => panic!(),
        };

        let lines = crate::storage::read_jsonl_lines(s.claims_path()).unwrap();
        let view = View::build("project", "p1", &lines, &[], &[]);
        let event = json!({"event_id": "ev_run1_000001", "thought_db": {"query_claim_ids": [claim_id]}});

        let chosen = claim_id.clone();
        let mind = move |_schema: &str, _prompt: &str, _tag: &str| -> Result<MindResponse> {
            Ok(MindResponse {
                obj: json!({
                    "status": "ok",
                    "confidence": 0.9,
                    "chosen_claim_ids": [chosen.clone()],
                    "explanation": "cites the claim directly",
                    "notes": ""
                }),
                transcript_path: PathBuf::from("/tmp/t.json"),
            })
        };

        let result = run_why_trace(
            &view,
            &View::build("global", "", &[], &[], &[]),
            &event,
            "why does the deploy key rotate",
            None,
            &mind,
            &s,
            Some("ev_run1_000001"),
            &WhyTraceConfig::default(),
        )
        .unwrap();

        assert_eq!(result.written_edge_ids.len(), 1);
        assert_eq!(result.obj["status"], "ok");
    }

    #[test]
    fn downgrades_to_insufficient_when_no_candidate_survives_filtering() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        let empty = View::build("project", "p1", &[], &[], &[]);
        let view = View::build("global", "", &[], &[], &[]);
        let event = json!({"event_id": "ev_run1_000001"});

        let mind = |_schema: &str, _prompt: &str, _tag: &str| -> Result<MindResponse> {
            Ok(MindResponse {
                obj: json!({
                    "status": "ok",
                    "confidence": 0.95,
                    "chosen_claim_ids": ["cl_not_a_candidate"],
                    "explanation": "",
                    "notes": ""
                }),
                transcript_path: PathBuf::from("/tmp/t.json"),
            })
        };

        let result = run_why_trace(&empty, &view, &event, "q", None, &mind, &s, Some("ev_run1_000001"), &WhyTraceConfig::default())
            .unwrap();
        assert_eq!(result.obj["status"], "insufficient");
        assert!(result.written_edge_ids.is_empty());
    }

    #[test]
    fn query_from_event_handles_evidence_like_and_kindless_records() {
        let with_kind = json!({"kind": "evidence", "facts": ["a", "b"], "results": ["c"], "unknowns": ["d"]});
        assert_eq!(query_from_event(&with_kind), "a b c d");

        let kindless = json!({"facts": ["only fact"]});
        assert_eq!(query_from_event(&kindless), "only fact");

        let decide_next = json!({"kind": "decide_next", "status": "ok", "next_action": "proceed"});
        assert_eq!(query_from_event(&decide_next), "ok proceed");

        let hands_input = json!({"kind": "hands_input", "input": "do the thing"});
        assert_eq!(query_from_event(&hands_input), "do the thing");

        let other = json!({"kind": "workflow_trigger", "workflow_name": "wf", "trigger_pattern": "pat"});
        assert_eq!(query_from_event(&other), "wf pat");
    }

    #[test]
    fn query_from_event_caps_per_key_limits() {
        let facts: Vec<String> = (0..10).map(|i| format!("f{i}")).collect();
        let event = json!({"facts": facts});
        let query = query_from_event(&event);
        assert_eq!(query.split(' ').count(), 6);
    }
}
