//! Filesystem layout and project identity (§4.10, §6.1).
//!
//! Pure path-joining helpers; no I/O, no git shelling (that belongs to an
//! external collaborator per §1).

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Derives a stable project id from an `identity_key`:
/// `"git:origin:" + normalized_remote + ":" + relpath` or
/// `"path:" + absolute_path`, computed by the caller.
///
/// Returns the first 16 hex characters of `sha256(identity_key)`.
pub fn project_id(identity_key: &str) -> String {
    let digest = Sha256::digest(identity_key.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Path layout rooted at the Knowledge Core home directory.
#[derive(Debug, Clone)]
pub struct Layout {
    home: PathBuf,
}

impl Layout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn global_evidence_path(&self) -> PathBuf {
        self.home.join("global").join("evidence.jsonl")
    }

    pub fn global_project_selection_path(&self) -> PathBuf {
        self.home.join("global").join("project_selection.json")
    }

    pub fn global_thoughtdb_dir(&self) -> PathBuf {
        self.home.join("thoughtdb").join("global")
    }

    pub fn global_claims_path(&self) -> PathBuf {
        self.global_thoughtdb_dir().join("claims.jsonl")
    }

    pub fn global_nodes_path(&self) -> PathBuf {
        self.global_thoughtdb_dir().join("nodes.jsonl")
    }

    pub fn global_edges_path(&self) -> PathBuf {
        self.global_thoughtdb_dir().join("edges.jsonl")
    }

    pub fn global_view_snapshot_path(&self) -> PathBuf {
        self.global_thoughtdb_dir().join("view.snapshot.json")
    }

    fn project_root(&self, project_id: &str) -> PathBuf {
        self.home.join("projects").join(project_id)
    }

    pub fn project_evidence_path(&self, project_id: &str) -> PathBuf {
        self.project_root(project_id).join("evidence.jsonl")
    }

    pub fn project_thoughtdb_dir(&self, project_id: &str) -> PathBuf {
        self.project_root(project_id).join("thoughtdb")
    }

    pub fn project_claims_path(&self, project_id: &str) -> PathBuf {
        self.project_thoughtdb_dir(project_id).join("claims.jsonl")
    }

    pub fn project_nodes_path(&self, project_id: &str) -> PathBuf {
        self.project_thoughtdb_dir(project_id).join("nodes.jsonl")
    }

    pub fn project_edges_path(&self, project_id: &str) -> PathBuf {
        self.project_thoughtdb_dir(project_id).join("edges.jsonl")
    }

    pub fn project_view_snapshot_path(&self, project_id: &str) -> PathBuf {
        self.project_thoughtdb_dir(project_id).join("view.snapshot.json")
    }

    pub fn project_selection_path(&self) -> PathBuf {
        self.global_project_selection_path()
    }
}
