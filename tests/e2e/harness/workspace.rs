use kc_core::thoughtdb::{Store, View};
use kc_core::storage;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated on-disk home directory for one test: separate project and
/// global ThoughtDB stores under a fresh temp directory.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn project_store(&self) -> Store {
        Store::new(
            self.project_claims_path(),
            self.dir.path().join("project").join("nodes.jsonl"),
            self.dir.path().join("project").join("edges.jsonl"),
        )
    }

    pub fn global_store(&self) -> Store {
        Store::new(
            self.dir.path().join("global").join("claims.jsonl"),
            self.dir.path().join("global").join("nodes.jsonl"),
            self.dir.path().join("global").join("edges.jsonl"),
        )
    }

    pub fn project_claims_path(&self) -> PathBuf {
        self.dir.path().join("project").join("claims.jsonl")
    }

    /// Rebuilds a `View` for `store` by re-reading its JSONL files from disk.
    pub fn load_view(store: &Store, scope_name: &str, project_id: &str) -> View {
        let claims = storage::read_jsonl_lines(store.claims_path()).unwrap_or_default();
        let nodes = storage::read_jsonl_lines(store.nodes_path()).unwrap_or_default();
        let edges = storage::read_jsonl_lines(store.edges_path()).unwrap_or_default();
        View::build(scope_name, project_id, &claims, &nodes, &edges)
    }
}
