//! Two claims with the same type, scope, project, and normalized text
//! collapse into one write (§4.3, invariant 4).

use crate::harness::TestHome;
use kc_core::thoughtdb::{ClaimType, ClaimWriteOutcome, NewClaim, Scope, Visibility};

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
fn second_write_redirects_to_the_first() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");

    let first = store.create_claim(&empty, claim("the deploy key rotates weekly")).unwrap();
    let first_id = match first {
        ClaimWriteOutcome::Created(id) => id,
        ClaimWriteOutcome::Deduplicated(_) => panic!("expected a fresh write"),
    };

    let view = TestHome::load_view(&store, "project", "p1");
    let second = store
        .create_claim(&view, claim("  The Deploy Key Rotates Weekly  "))
        .unwrap();
    assert_eq!(second, ClaimWriteOutcome::Deduplicated(first_id));

    let final_view = TestHome::load_view(&store, "project", "p1");
    assert_eq!(final_view.claims_by_id.len(), 1);
}

#[test]
fn different_project_scope_is_not_deduplicated() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");
    store.create_claim(&empty, claim("shared wording")).unwrap();

    let mut other = claim("shared wording");
    other.project_id = "p2".to_string();
    let view = TestHome::load_view(&store, "project", "p1");
    let outcome = store.create_claim(&view, other).unwrap();
    assert!(matches!(outcome, ClaimWriteOutcome::Created(_)));

    let final_view = TestHome::load_view(&store, "project", "p1");
    assert_eq!(final_view.claims_by_id.len(), 2);
}
