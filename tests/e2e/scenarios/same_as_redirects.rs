//! `same_as` edges canonicalize ids on resolution and are hidden from
//! default iteration, but remain visible with `include_aliases` (§4.2,
//! invariant 6).

use crate::harness::TestHome;
use kc_core::thoughtdb::{ClaimType, ClaimWriteOutcome, EdgeType, NewClaim, NewEdge, Scope, Visibility};

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
fn alias_resolves_and_is_hidden_unless_requested() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");

    let canonical = match store.create_claim(&empty, claim("staging uses us-east-1")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };
    let view = TestHome::load_view(&store, "project", "p1");
    let alias = match store.create_claim(&view, claim("staging region is us-east-1")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };

    let view = TestHome::load_view(&store, "project", "p1");
    store
        .create_edge(
            &view,
            NewEdge {
                edge_type: EdgeType::SameAs,
                from_id: alias.clone(),
                to_id: canonical.clone(),
                scope: Scope::Project,
                project_id: "p1".to_string(),
                source_refs: vec![],
                notes: String::new(),
            },
        )
        .unwrap();

    let view = TestHome::load_view(&store, "project", "p1");
    assert_eq!(view.resolve_id(&alias), canonical);
    assert_eq!(view.resolve_id(&canonical), canonical);

    let hidden = view.iter_claims(true, false, None);
    let ids: Vec<_> = hidden.iter().map(|c| c.claim.claim_id.clone()).collect();
    assert!(ids.contains(&canonical));
    assert!(!ids.contains(&alias));

    let shown = view.iter_claims(true, true, None);
    let alias_view = shown.iter().find(|c| c.claim.claim_id == alias).unwrap();
    assert_eq!(alias_view.canonical_id, canonical);
}

#[test]
fn cyclic_same_as_chain_terminates() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");

    let a = match store.create_claim(&empty, claim("a")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };
    let view = TestHome::load_view(&store, "project", "p1");
    let b = match store.create_claim(&view, claim("b")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };

    let view = TestHome::load_view(&store, "project", "p1");
    for (from, to) in [(a.clone(), b.clone()), (b.clone(), a.clone())] {
        store
            .create_edge(
                &view,
                NewEdge {
                    edge_type: EdgeType::SameAs,
                    from_id: from,
                    to_id: to,
                    scope: Scope::Project,
                    project_id: "p1".to_string(),
                    source_refs: vec![],
                    notes: String::new(),
                },
            )
            .unwrap();
    }

    let view = TestHome::load_view(&store, "project", "p1");
    // Must return within the 20-hop cap rather than looping forever.
    let _ = view.resolve_id(&a);
}
