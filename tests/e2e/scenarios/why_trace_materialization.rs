//! WhyTrace writes `depends_on` edges only when the injected model reports
//! a confident verdict over a candidate the run actually surfaced (§4.5).

use crate::harness::TestHome;
use kc_core::thoughtdb::{ClaimType, ClaimWriteOutcome, NewClaim, Scope, View, Visibility};
use kc_core::{run_why_trace, MindResponse, WhyTraceConfig};
use serde_json::json;
use std::path::PathBuf;

fn claim(text: &str) -> NewClaim {
    NewClaim {
        claim_type: ClaimType::Fact,
        text: text.to_string(),
        scope: Scope::Project,
        project_id: "p1".to_string(),
        visibility: Visibility::Project,
        valid_from: None,
        valid_to: None,
        tags: vec![],
        source_refs: vec![],
        confidence: 1.0,
        notes: String::new(),
    }
}

#[test]
fn confident_verdict_over_a_hinted_candidate_writes_an_edge() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");

    let claim_id = match store.create_claim(&empty, claim("the deploy key rotates weekly")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };

    let project_view = TestHome::load_view(&store, "project", "p1");
    let global_view = View::build("global", "", &[], &[], &[]);
    let event = json!({
        "event_id": "ev_run1_000001",
        "thought_db": {"query_claim_ids": [claim_id.clone()]},
    });

    let chosen = claim_id.clone();
    let mind = move |_schema: &str, _prompt: &str, _tag: &str| -> kc_core::Result<MindResponse> {
        Ok(MindResponse {
            obj: json!({
                "status": "ok",
                "confidence": 0.9,
                "chosen_claim_ids": [chosen.clone()],
                "explanation": "directly cited",
                "notes": "",
            }),
            transcript_path: PathBuf::from("/dev/null"),
        })
    };

    let result = run_why_trace(
        &project_view,
        &global_view,
        &event,
        "why does the deploy key rotate",
        None,
        &mind,
        &store,
        Some("ev_run1_000001"),
        &WhyTraceConfig::default(),
    )
    .unwrap();

    assert_eq!(result.obj["status"], "ok");
    assert_eq!(result.written_edge_ids.len(), 1);

    let view = TestHome::load_view(&store, "project", "p1");
    assert_eq!(view.edges.len(), 1);
    assert_eq!(view.edges[0].from_id, "ev_run1_000001");
    assert_eq!(view.edges[0].to_id, claim_id);
}

#[test]
fn verdict_over_a_non_candidate_is_downgraded_and_writes_nothing() {
    let home = TestHome::new();
    let store = home.project_store();
    let project_view = View::build("project", "p1", &[], &[], &[]);
    let global_view = View::build("global", "", &[], &[], &[]);
    let event = json!({"event_id": "ev_run1_000002"});

    let mind = |_schema: &str, _prompt: &str, _tag: &str| -> kc_core::Result<MindResponse> {
        Ok(MindResponse {
            obj: json!({
                "status": "ok",
                "confidence": 0.95,
                "chosen_claim_ids": ["cl_never_surfaced"],
                "explanation": "",
                "notes": "",
            }),
            transcript_path: PathBuf::from("/dev/null"),
        })
    };

    let result = run_why_trace(
        &project_view,
        &global_view,
        &event,
        "unrelated query",
        None,
        &mind,
        &store,
        Some("ev_run1_000002"),
        &WhyTraceConfig::default(),
    )
    .unwrap();

    assert_eq!(result.obj["status"], "insufficient");
    assert!(result.written_edge_ids.is_empty());

    let view = TestHome::load_view(&store, "project", "p1");
    assert!(view.edges.is_empty());
}
