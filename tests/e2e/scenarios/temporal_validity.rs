//! A claim scoped to a future `valid_from` is excluded from active
//! iteration until `as_of` reaches that window (§4.2, invariant 7).

use crate::harness::TestHome;
use kc_core::thoughtdb::{ClaimType, NewClaim, Scope, Visibility};

#[test]
fn claim_becomes_visible_once_as_of_enters_its_window() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");

    store
        .create_claim(
            &empty,
            NewClaim {
                claim_type: ClaimType::Fact,
                text: "maintenance window opens".to_string(),
                scope: Scope::Project,
                project_id: "p1".to_string(),
                visibility: Visibility::Project,
                valid_from: Some("2999-01-01T00:00:00Z".to_string()),
                valid_to: None,
                tags: vec![],
                source_refs: vec![],
                confidence: 1.0,
                notes: String::new(),
            },
        )
        .unwrap();
    store
        .create_claim(
            &empty,
            NewClaim {
                claim_type: ClaimType::Fact,
                text: "always true fact".to_string(),
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
        .unwrap();

    let view = TestHome::load_view(&store, "project", "p1");

    let before = view.iter_claims(false, false, Some("2026-01-01T00:00:00Z"));
    let texts: Vec<_> = before.iter().map(|c| c.claim.text.as_str()).collect();
    assert!(texts.contains(&"always true fact"));
    assert!(!texts.contains(&"maintenance window opens"));

    let after = view.iter_claims(false, false, Some("2999-06-01T00:00:00Z"));
    let texts: Vec<_> = after.iter().map(|c| c.claim.text.as_str()).collect();
    assert!(texts.contains(&"always true fact"));
    assert!(texts.contains(&"maintenance window opens"));
}
