//! Compaction (§4.7): archives the current claims/nodes/edges JSONL as gzip
//! under a timestamped directory, rewrites each file into a canonical
//! minimal form preserving semantics, and invalidates the View snapshot.
//!
//! Compaction never drops an active record; it only deduplicates trailing
//! retracts (last-per-id, observed order) and edges (last occurrence per
//! `(edge_type, from, to)` key).

use crate::error::{KcError, Result};
use crate::ids;
use crate::storage;
use crate::thoughtdb::types::{ClaimRecord, Edge, NodeRecord};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inputs to one compaction run: the three source files, the directory
/// compaction archives into, and the View snapshot path to invalidate.
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    pub claims_path: PathBuf,
    pub nodes_path: PathBuf,
    pub edges_path: PathBuf,
    /// Directory under which `archive/<timestamp>/` is created.
    pub dir: PathBuf,
    pub snapshot_path: PathBuf,
    /// Compute the plan and counts but make no filesystem changes.
    pub dry_run: bool,
}

/// Input/output line counts for one compacted file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileCompactionStats {
    pub input_lines: usize,
    pub output_lines: usize,
}

/// What happened to the View snapshot as part of compaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotOutcome {
    pub path: PathBuf,
    pub deleted: bool,
    pub status: String,
}

/// One archived file's manifest entry.
#[derive(Debug, Clone, Serialize)]
struct ManifestEntry {
    file: String,
    sha256: String,
    bytes: u64,
}

/// Result of [`compact`].
#[derive(Debug, Clone, Serialize)]
pub struct CompactionReport {
    pub claims: FileCompactionStats,
    pub nodes: FileCompactionStats,
    pub edges: FileCompactionStats,
    pub archive_dir: Option<PathBuf>,
    pub snapshot: SnapshotOutcome,
    pub dry_run: bool,
}

/// Runs compaction per §4.7. Rejects if either claims or nodes file
/// contains an unrecognized `kind` (invariant enforcement — View
/// materialization is lenient, compaction is not).
pub fn compact(config: &CompactionConfig) -> Result<CompactionReport> {
    let claim_lines = storage::read_jsonl_lines(&config.claims_path)?;
    let node_lines = storage::read_jsonl_lines(&config.nodes_path)?;
    let edge_lines = storage::read_jsonl_lines(&config.edges_path)?;

    let (claims_plan, claims_input) = plan_claims(&claim_lines, &config.claims_path)?;
    let (nodes_plan, nodes_input) = plan_nodes(&node_lines, &config.nodes_path)?;
    let (edges_plan, edges_input) = plan_edges(&edge_lines, &config.edges_path)?;

    let claims_stats = FileCompactionStats {
        input_lines: claims_input,
        output_lines: claims_plan.len(),
    };
    let nodes_stats = FileCompactionStats {
        input_lines: nodes_input,
        output_lines: nodes_plan.len(),
    };
    let edges_stats = FileCompactionStats {
        input_lines: edges_input,
        output_lines: edges_plan.len(),
    };

    if config.dry_run {
        debug!(
            claims_in = claims_stats.input_lines,
            nodes_in = nodes_stats.input_lines,
            edges_in = edges_stats.input_lines,
            "compaction dry run: plan computed, no writes"
        );
        return Ok(CompactionReport {
            claims: claims_stats,
            nodes: nodes_stats,
            edges: edges_stats,
            archive_dir: None,
            snapshot: SnapshotOutcome {
                path: config.snapshot_path.clone(),
                deleted: false,
                status: "dry_run".to_string(),
            },
            dry_run: true,
        });
    }

    let archive_dir = archive_current_files(config)?;
    debug!(dir = %archive_dir.display(), "archived pre-compaction files");

    write_lines_atomically(&config.claims_path, &claims_plan)?;
    write_lines_atomically(&config.nodes_path, &nodes_plan)?;
    write_lines_atomically(&config.edges_path, &edges_plan)?;
    debug!(
        claims = format!("{}->{}", claims_stats.input_lines, claims_stats.output_lines),
        nodes = format!("{}->{}", nodes_stats.input_lines, nodes_stats.output_lines),
        edges = format!("{}->{}", edges_stats.input_lines, edges_stats.output_lines),
        "compaction rewrote claims/nodes/edges"
    );

    let snapshot = invalidate_snapshot(&config.snapshot_path)?;

    Ok(CompactionReport {
        claims: claims_stats,
        nodes: nodes_stats,
        edges: edges_stats,
        archive_dir: Some(archive_dir),
        snapshot,
        dry_run: false,
    })
}

/// Builds the compacted `claims.jsonl` content: creates sorted by
/// `(asserted_ts, claim_id)`, followed by one retraction per retracted id
/// in the order its last retraction was observed.
fn plan_claims(lines: &[String], path: &Path) -> Result<(Vec<String>, usize)> {
    let mut claims_by_id: HashMap<String, crate::thoughtdb::types::Claim> = HashMap::new();
    let mut retract_order: Vec<String> = Vec::new();
    let mut retracts_by_id: HashMap<String, ClaimRecord> = HashMap::new();

    for (i, line) in lines.iter().enumerate() {
        let record: ClaimRecord = serde_json::from_str(line).map_err(|e| KcError::MalformedRecord {
            path: path.to_path_buf(),
            line: i + 1,
            reason: e.to_string(),
        })?;
        match record {
            ClaimRecord::Claim(claim) => {
                claims_by_id.insert(claim.claim_id.clone(), claim);
            }
            ClaimRecord::ClaimRetract(ref retract) => {
                let id = retract.claim_id.clone();
                if retracts_by_id.insert(id.clone(), record.clone()).is_none() {
                    retract_order.push(id);
                } else {
                    retract_order.retain(|existing| existing != &id);
                    retract_order.push(id);
                }
            }
        }
    }

    let mut sorted_claims: Vec<&crate::thoughtdb::types::Claim> = claims_by_id.values().collect();
    sorted_claims.sort_by(|a, b| a.asserted_ts.cmp(&b.asserted_ts).then_with(|| a.claim_id.cmp(&b.claim_id)));

    let mut out = Vec::with_capacity(sorted_claims.len() + retract_order.len());
    for claim in sorted_claims {
        out.push(serde_json::to_string(&storage::sorted_keys(&ClaimRecord::Claim(claim.clone()))?)?);
    }
    for id in &retract_order {
        out.push(serde_json::to_string(&storage::sorted_keys(&retracts_by_id[id])?)?);
    }
    Ok((out, lines.len()))
}

/// Mirrors [`plan_claims`] for `nodes.jsonl`.
fn plan_nodes(lines: &[String], path: &Path) -> Result<(Vec<String>, usize)> {
    let mut nodes_by_id: HashMap<String, crate::thoughtdb::types::Node> = HashMap::new();
    let mut retract_order: Vec<String> = Vec::new();
    let mut retracts_by_id: HashMap<String, NodeRecord> = HashMap::new();

    for (i, line) in lines.iter().enumerate() {
        let record: NodeRecord = serde_json::from_str(line).map_err(|e| KcError::MalformedRecord {
            path: path.to_path_buf(),
            line: i + 1,
            reason: e.to_string(),
        })?;
        match record {
            NodeRecord::Node(node) => {
                nodes_by_id.insert(node.node_id.clone(), node);
            }
            NodeRecord::NodeRetract(ref retract) => {
                let id = retract.node_id.clone();
                if retracts_by_id.insert(id.clone(), record.clone()).is_none() {
                    retract_order.push(id);
                } else {
                    retract_order.retain(|existing| existing != &id);
                    retract_order.push(id);
                }
            }
        }
    }

    let mut sorted_nodes: Vec<&crate::thoughtdb::types::Node> = nodes_by_id.values().collect();
    sorted_nodes.sort_by(|a, b| a.asserted_ts.cmp(&b.asserted_ts).then_with(|| a.node_id.cmp(&b.node_id)));

    let mut out = Vec::with_capacity(sorted_nodes.len() + retract_order.len());
    for node in sorted_nodes {
        out.push(serde_json::to_string(&storage::sorted_keys(&NodeRecord::Node(node.clone()))?)?);
    }
    for id in &retract_order {
        out.push(serde_json::to_string(&storage::sorted_keys(&retracts_by_id[id])?)?);
    }
    Ok((out, lines.len()))
}

/// Dedupe key: `(edge_type, from_id, to_id)`, or `edge_id` for any edge with
/// a blank endpoint (where the typed key wouldn't distinguish edges).
#[derive(PartialEq, Eq, Hash)]
enum EdgeKey {
    Typed(String, String, String),
    ById(String),
}

/// Dedupes edges by `(edge_type, from_id, to_id)`, keeping the last
/// occurrence (invariant 9), falling back to `edge_id` when an endpoint is
/// blank. Rejects any unparseable line, matching [`plan_claims`]/
/// [`plan_nodes`]'s treatment of corrupt input.
fn plan_edges(lines: &[String], path: &Path) -> Result<(Vec<String>, usize)> {
    let mut edges: Vec<Edge> = Vec::new();
    let mut last_index_by_key: HashMap<EdgeKey, usize> = HashMap::new();

    for (i, line) in lines.iter().enumerate() {
        let edge: Edge = serde_json::from_str(line).map_err(|e| KcError::MalformedRecord {
            path: path.to_path_buf(),
            line: i + 1,
            reason: e.to_string(),
        })?;
        let key = if edge.from_id.is_empty() || edge.to_id.is_empty() {
            EdgeKey::ById(edge.edge_id.clone())
        } else {
            EdgeKey::Typed(edge.edge_type.as_str().to_string(), edge.from_id.clone(), edge.to_id.clone())
        };
        let idx = edges.len();
        last_index_by_key.insert(key, idx);
        edges.push(edge);
    }

    let keep: HashSet<usize> = last_index_by_key.values().copied().collect();
    let out: Vec<String> = edges
        .iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, e)| {
            serde_json::to_string(&storage::sorted_keys(e).expect("edge always serializes"))
                .expect("edge always serializes")
        })
        .collect();
    Ok((out, lines.len()))
}

fn write_lines_atomically(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = String::new();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    storage::atomic_write_bytes(path, content.as_bytes())
}

/// Archives the three current files as `.gz` under
/// `<dir>/archive/<YYYYMMDDTHHMMSSZ>/`, with a `manifest.json` carrying
/// sha256 of the (pre-compaction) source files.
fn archive_current_files(config: &CompactionConfig) -> Result<PathBuf> {
    let ts = filename_safe_timestamp();
    let archive_dir = config.dir.join("archive").join(&ts);
    fs::create_dir_all(&archive_dir)?;

    let mut manifest = Vec::new();
    for (name, path) in [
        ("claims.jsonl", &config.claims_path),
        ("nodes.jsonl", &config.nodes_path),
        ("edges.jsonl", &config.edges_path),
    ] {
        let bytes = if path.exists() { fs::read(path)? } else { Vec::new() };
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let gz_path = archive_dir.join(format!("{name}.gz"));
        let mut encoder = GzEncoder::new(fs::File::create(&gz_path)?, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;

        manifest.push(ManifestEntry {
            file: format!("{name}.gz"),
            sha256,
            bytes: bytes.len() as u64,
        });
    }

    storage::atomic_write_json(&archive_dir.join("manifest.json"), &manifest)?;
    Ok(archive_dir)
}

fn invalidate_snapshot(path: &Path) -> Result<SnapshotOutcome> {
    if path.exists() {
        fs::remove_file(path)?;
        Ok(SnapshotOutcome {
            path: path.to_path_buf(),
            deleted: true,
            status: "invalidated".to_string(),
        })
    } else {
        Ok(SnapshotOutcome {
            path: path.to_path_buf(),
            deleted: false,
            status: "absent".to_string(),
        })
    }
}

fn filename_safe_timestamp() -> String {
    let stamp = ids::now_rfc3339().replace([':', '-', '.', '+'], "");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{stamp}_{}", &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thoughtdb::store::{ClaimWriteOutcome, NewClaim, NewEdge, Store};
    use crate::thoughtdb::types::{ClaimType, EdgeType, Scope, Visibility};
    use crate::thoughtdb::view::View;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> CompactionConfig {
        CompactionConfig {
            claims_path: tmp.path().join("claims.jsonl"),
            nodes_path: tmp.path().join("nodes.jsonl"),
            edges_path: tmp.path().join("edges.jsonl"),
            dir: tmp.path().to_path_buf(),
            snapshot_path: tmp.path().join("view.snapshot.json"),
            dry_run: false,
        }
    }

    fn new_claim(text: &str) -> NewClaim {
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

    /// Scenario 6 — compaction preserves the effective view.
    #[test]
    fn compaction_preserves_effective_view_scenario_6() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        let store = Store::new(cfg.claims_path.clone(), cfg.nodes_path.clone(), cfg.edges_path.clone());

        let empty = View::build("project", "p1", &[], &[], &[]);
        let c1 = match store.create_claim(&empty, new_claim("c1")).unwrap() {
            ClaimWriteOutcome::Created(id) => id,
            _ => panic!(),
        };
        let view = View::build(
            "project",
            "p1",
            &storage::read_jsonl_lines(&cfg.claims_path).unwrap(),
            &[],
            &[],
        );
        let c2 = match store.create_claim(&view, new_claim("c2")).unwrap() {
            ClaimWriteOutcome::Created(id) => id,
            _ => panic!(),
        };

        let view = View::build(
            "project",
            "p1",
            &storage::read_jsonl_lines(&cfg.claims_path).unwrap(),
            &[],
            &[],
        );
        store
            .create_edge(
                &view,
                NewEdge {
                    edge_type: EdgeType::DependsOn,
                    from_id: c2.clone(),
                    to_id: c1.clone(),
                    scope: Scope::Project,
                    project_id: "p1".to_string(),
                    source_refs: vec![],
                    notes: "first".to_string(),
                },
            )
            .unwrap();
        store
            .create_edge(
                &view,
                NewEdge {
                    edge_type: EdgeType::DependsOn,
                    from_id: c2.clone(),
                    to_id: c1.clone(),
                    scope: Scope::Project,
                    project_id: "p1".to_string(),
                    source_refs: vec![],
                    notes: "second".to_string(),
                },
            )
            .unwrap();

        store.retract_claim(&c1, "gone", vec![]).unwrap();
        store.retract_claim(&c1, "gone again", vec![]).unwrap();

        let pre_view = View::build(
            "project",
            "p1",
            &storage::read_jsonl_lines(&cfg.claims_path).unwrap(),
            &[],
            &storage::read_jsonl_lines(&cfg.edges_path).unwrap(),
        );
        assert_eq!(pre_view.claim_status(&c1), crate::thoughtdb::types::Status::Retracted);

        let report = compact(&cfg).unwrap();
        assert_eq!(report.claims.output_lines, 3); // c1, c2, one retract
        assert_eq!(report.edges.output_lines, 1);
        assert!(report.snapshot.deleted || report.snapshot.status == "absent");
        assert!(report.archive_dir.is_some());
        assert!(report.archive_dir.unwrap().join("manifest.json").exists());

        let post_view = View::build(
            "project",
            "p1",
            &storage::read_jsonl_lines(&cfg.claims_path).unwrap(),
            &[],
            &storage::read_jsonl_lines(&cfg.edges_path).unwrap(),
        );
        assert_eq!(post_view.claims_by_id.len(), 2);
        assert_eq!(post_view.claim_status(&c1), crate::thoughtdb::types::Status::Retracted);
        assert_eq!(post_view.claim_status(&c2), crate::thoughtdb::types::Status::Active);
        assert_eq!(post_view.edges.len(), 1);
        assert_eq!(post_view.edges[0].notes, "second");
    }

    #[test]
    fn compaction_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        let store = Store::new(cfg.claims_path.clone(), cfg.nodes_path.clone(), cfg.edges_path.clone());
        let empty = View::build("project", "p1", &[], &[], &[]);
        store.create_claim(&empty, new_claim("only")).unwrap();

        let first = compact(&cfg).unwrap();
        let second = compact(&cfg).unwrap();
        assert_eq!(first.claims.output_lines, second.claims.output_lines);
        assert_eq!(second.claims.input_lines, first.claims.output_lines);
    }

    #[test]
    fn dry_run_skips_all_writes() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.dry_run = true;
        let store = Store::new(cfg.claims_path.clone(), cfg.nodes_path.clone(), cfg.edges_path.clone());
        let empty = View::build("project", "p1", &[], &[], &[]);
        store.create_claim(&empty, new_claim("only")).unwrap();

        let before = fs::read_to_string(&cfg.claims_path).unwrap();
        let report = compact(&cfg).unwrap();
        let after = fs::read_to_string(&cfg.claims_path).unwrap();
        assert_eq!(before, after);
        assert!(report.archive_dir.is_none());
        assert_eq!(report.snapshot.status, "dry_run");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        fs::write(&cfg.claims_path, "{\"kind\":\"mystery\"}\n").unwrap();

        let err = compact(&cfg).unwrap_err();
        assert!(matches!(err, KcError::MalformedRecord { .. }));
    }

    #[test]
    fn malformed_edge_line_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let cfg = config(&tmp);
        fs::write(&cfg.edges_path, "not json\n").unwrap();

        let err = compact(&cfg).unwrap_err();
        assert!(matches!(err, KcError::MalformedRecord { .. }));
    }

    #[test]
    fn plan_edges_falls_back_to_edge_id_for_blank_endpoints() {
        let edge_a = serde_json::json!({
            "edge_id": "e1", "edge_type": "depends_on", "from_id": "", "to_id": "c1",
            "scope": "project", "project_id": "p1", "visibility": "project",
            "asserted_ts": "2024-01-01T00:00:00Z", "source_refs": [], "notes": "", "version": "v1",
        });
        let edge_b = serde_json::json!({
            "edge_id": "e2", "edge_type": "depends_on", "from_id": "", "to_id": "c1",
            "scope": "project", "project_id": "p1", "visibility": "project",
            "asserted_ts": "2024-01-01T00:00:01Z", "source_refs": [], "notes": "", "version": "v1",
        });
        let lines = vec![edge_a.to_string(), edge_b.to_string()];
        let (out, input) = plan_edges(&lines, Path::new("edges.jsonl")).unwrap();
        assert_eq!(input, 2);
        // Distinct edge_ids, both blank-endpoint: neither collapses into the other.
        assert_eq!(out.len(), 2);
    }
}
