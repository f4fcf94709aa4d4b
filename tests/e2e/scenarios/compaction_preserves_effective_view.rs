//! Compaction rewrites the JSONL stores but must not change what the
//! resulting View reports (§4.7, round-trip law).

use crate::harness::TestHome;
use kc_core::compaction::{self, CompactionConfig};
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
fn effective_view_is_unchanged_across_compaction() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");

    let keep = match store.create_claim(&empty, claim("kept fact")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };
    let view = TestHome::load_view(&store, "project", "p1");
    let gone = match store.create_claim(&view, claim("retracted fact")).unwrap() {
        ClaimWriteOutcome::Created(id) => id,
        other => panic!("unexpected {other:?}"),
    };
    store.retract_claim(&gone, "no longer true", vec![]).unwrap();

    let view = TestHome::load_view(&store, "project", "p1");
    store
        .create_edge(
            &view,
            NewEdge {
                edge_type: EdgeType::Mentions,
                from_id: keep.clone(),
                to_id: gone.clone(),
                scope: Scope::Project,
                project_id: "p1".to_string(),
                source_refs: vec![],
                notes: "first".to_string(),
            },
        )
        .unwrap();
    // Re-asserting the same edge key with different notes: compaction keeps
    // only the last occurrence.
    let view = TestHome::load_view(&store, "project", "p1");
    store
        .create_edge(
            &view,
            NewEdge {
                edge_type: EdgeType::Mentions,
                from_id: keep.clone(),
                to_id: gone.clone(),
                scope: Scope::Project,
                project_id: "p1".to_string(),
                source_refs: vec![],
                notes: "second".to_string(),
            },
        )
        .unwrap();

    let before = TestHome::load_view(&store, "project", "p1");
    assert_eq!(before.claim_status(&keep), Status::Active);
    assert_eq!(before.claim_status(&gone), Status::Retracted);
    assert_eq!(before.edges.len(), 2);

    let config = CompactionConfig {
        claims_path: store.claims_path().to_path_buf(),
        nodes_path: store.nodes_path().to_path_buf(),
        edges_path: store.edges_path().to_path_buf(),
        dir: home.path().join("project"),
        snapshot_path: home.path().join("project").join("view_snapshot.json"),
        dry_run: false,
    };
    let report = compaction::compact(&config).unwrap();
    assert_eq!(report.claims.output_lines, 2);
    assert_eq!(report.edges.output_lines, 1);
    assert!(report.archive_dir.is_some());

    let after = TestHome::load_view(&store, "project", "p1");
    assert_eq!(after.claim_status(&keep), Status::Active);
    assert_eq!(after.claim_status(&gone), Status::Retracted);
    assert_eq!(after.edges.len(), 1);
    assert_eq!(after.edges[0].notes, "second");
    assert_eq!(
        after.claims_by_id.get(&keep).map(|c| c.text.as_str()),
        before.claims_by_id.get(&keep).map(|c| c.text.as_str()),
    );
}

#[test]
fn dry_run_leaves_files_untouched() {
    let home = TestHome::new();
    let store = home.project_store();
    let empty = TestHome::load_view(&store, "project", "p1");
    store.create_claim(&empty, claim("only fact")).unwrap();

    let config = CompactionConfig {
        claims_path: store.claims_path().to_path_buf(),
        nodes_path: store.nodes_path().to_path_buf(),
        edges_path: store.edges_path().to_path_buf(),
        dir: home.path().join("project"),
        snapshot_path: home.path().join("project").join("view_snapshot.json"),
        dry_run: true,
    };
    let before_bytes = std::fs::read(store.claims_path()).unwrap();
    let report = compaction::compact(&config).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.snapshot.status, "dry_run");
    let after_bytes = std::fs::read(store.claims_path()).unwrap();
    assert_eq!(before_bytes, after_bytes);
}
