//! Status derives as retracted > superseded > active (§4.2, invariant 5).

use crate::harness::TestHome;
use kc_core::thoughtdb::{ClaimType, ClaimWriteOutcome, EdgeType, NewClaim, NewEdge, Scope, Status, Visibility};

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
fn superseded_then_retracted_precedence() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");

    let c1 = match store.create_claim(&empty, claim("old policy")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };
    let view = TestHome::load_view(&store, "project", "p1");
    let c2 = match store.create_claim(&view, claim("new policy")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };

    let view = TestHome::load_view(&store, "project", "p1");
    store
        .create_edge(
            &view,
            NewEdge {
                edge_type: EdgeType::Supersedes,
                from_id: c1.clone(),
                to_id: c2.clone(),
                scope: Scope::Project,
                project_id: "p1".to_string(),
                source_refs: vec![],
                notes: String::new(),
            },
        )
        .unwrap();

    let view = TestHome::load_view(&store, "project", "p1");
    assert_eq!(view.claim_status(&c1), Status::Superseded);
    assert_eq!(view.claim_status(&c2), Status::Active);

    store.retract_claim(&c2, "no longer applies", vec![]).unwrap();
    let view = TestHome::load_view(&store, "project", "p1");
    assert_eq!(view.claim_status(&c2), Status::Retracted);
    // Retraction outranks supersession for c1 too, once it is also retracted.
    store.retract_claim(&c1, "cleanup", vec![]).unwrap();
    let view = TestHome::load_view(&store, "project", "p1");
    assert_eq!(view.claim_status(&c1), Status::Retracted);
}
