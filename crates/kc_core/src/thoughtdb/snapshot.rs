//! View-snapshot caching (§4.8): a View is rebuilt from JSONL only when the
//! `(size, mtime_ns)` of its three source files changes (invariant 10).
//!
//! Two layers: an in-process map keyed by the snapshot file's path (so a
//! single long-lived process never reparses unchanged files), backed by a
//! JSON file on disk so a freshly started process can skip the rebuild too
//! if nothing changed since the last run.

use super::store::Store;
use super::view::View;
use crate::error::Result;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

type FileMeta = (u64, i64);

/// Bumped whenever the persisted snapshot's shape changes incompatibly.
const SNAPSHOT_KIND: &str = "kc_view_snapshot";
const SNAPSHOT_VERSION: u32 = 1;

/// A persisted View plus the file metadata it was built from and the
/// scope/project identity it belongs to (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSnapshot {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    built_ts: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    project_id: String,
    claims_meta: FileMeta,
    nodes_meta: FileMeta,
    edges_meta: FileMeta,
    view: View,
}

impl Default for PersistedSnapshot {
    fn default() -> Self {
        Self {
            kind: String::new(),
            version: 0,
            built_ts: String::new(),
            scope: String::new(),
            project_id: String::new(),
            claims_meta: (0, 0),
            nodes_meta: (0, 0),
            edges_meta: (0, 0),
            view: View::default(),
        }
    }
}

impl PersistedSnapshot {
    fn matches(&self, scope_name: &str, project_id: &str, claims_meta: FileMeta, nodes_meta: FileMeta, edges_meta: FileMeta) -> bool {
        self.kind == SNAPSHOT_KIND
            && self.version == SNAPSHOT_VERSION
            && self.scope == scope_name
            && self.project_id == project_id
            && self.claims_meta == claims_meta
            && self.nodes_meta == nodes_meta
            && self.edges_meta == edges_meta
    }
}

/// In-process cache of materialized Views, keyed by the snapshot file path
/// each one is persisted under.
#[derive(Default)]
pub struct SnapshotCache {
    entries: Mutex<HashMap<PathBuf, Arc<PersistedSnapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current View for `store`, rebuilding it only if the
    /// underlying files changed since the last call (in this process or,
    /// via `snapshot_path`, a previous one).
    pub fn get_or_build(
        &self,
        snapshot_path: &Path,
        store: &Store,
        scope_name: &str,
        project_id: &str,
    ) -> Result<Arc<View>> {
        let claims_meta = storage::file_meta(store.claims_path());
        let nodes_meta = storage::file_meta(store.nodes_path());
        let edges_meta = storage::file_meta(store.edges_path());

        {
            let entries = self.entries.lock().expect("snapshot cache poisoned");
            if let Some(cached) = entries.get(snapshot_path) {
                if cached.matches(scope_name, project_id, claims_meta, nodes_meta, edges_meta) {
                    return Ok(Arc::new(cached.view.clone()));
                }
            }
        }

        if let Some(from_disk) =
            self.load_if_fresh(snapshot_path, scope_name, project_id, claims_meta, nodes_meta, edges_meta)
        {
            let view = Arc::new(from_disk.view.clone());
            self.entries
                .lock()
                .expect("snapshot cache poisoned")
                .insert(snapshot_path.to_path_buf(), Arc::new(from_disk));
            return Ok(view);
        }

        debug!(
            snapshot_path = %snapshot_path.display(),
            scope = scope_name,
            "rebuilding view from source jsonl"
        );
        let claim_lines = storage::read_jsonl_lines(store.claims_path())?;
        let node_lines = storage::read_jsonl_lines(store.nodes_path())?;
        let edge_lines = storage::read_jsonl_lines(store.edges_path())?;
        let view = View::build(scope_name, project_id, &claim_lines, &node_lines, &edge_lines);

        let persisted = PersistedSnapshot {
            kind: SNAPSHOT_KIND.to_string(),
            version: SNAPSHOT_VERSION,
            built_ts: crate::ids::now_rfc3339(),
            scope: scope_name.to_string(),
            project_id: project_id.to_string(),
            claims_meta,
            nodes_meta,
            edges_meta,
            view: view.clone(),
        };
        storage::atomic_write_json(snapshot_path, &persisted)?;
        self.entries
            .lock()
            .expect("snapshot cache poisoned")
            .insert(snapshot_path.to_path_buf(), Arc::new(persisted));

        Ok(Arc::new(view))
    }

    /// Drops the cached entry for `snapshot_path`, forcing a rebuild on the
    /// next call. Used by compaction, which rewrites the source files out
    /// from under any metadata the cache might otherwise still consider
    /// fresh by coincidence.
    pub fn invalidate(&self, snapshot_path: &Path) {
        self.entries
            .lock()
            .expect("snapshot cache poisoned")
            .remove(snapshot_path);
    }

    fn load_if_fresh(
        &self,
        snapshot_path: &Path,
        scope_name: &str,
        project_id: &str,
        claims_meta: FileMeta,
        nodes_meta: FileMeta,
        edges_meta: FileMeta,
    ) -> Option<PersistedSnapshot> {
        if !snapshot_path.exists() {
            return None;
        }
        let mut warnings = Vec::new();
        let persisted: PersistedSnapshot = storage::read_best_effort_json(snapshot_path, &mut warnings);
        if persisted.matches(scope_name, project_id, claims_meta, nodes_meta, edges_meta) {
            Some(persisted)
        } else {
            None
        }
    }
}
