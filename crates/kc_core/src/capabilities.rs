//! Injected capabilities (§6.3): the library never talks to a model or a
//! text index directly. Callers hand in an implementation of these traits;
//! retrieval and WhyTrace degrade gracefully when one is absent.

use crate::error::Result;
use crate::thoughtdb::Scope;
use std::path::PathBuf;

/// One hit returned by a [`TextIndex`] search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub item_id: String,
    pub kind: String,
    pub scope: Scope,
    pub project_id: String,
}

/// A full-text memory index used only to seed retrieval. Retrieval degrades
/// gracefully if no `TextIndex` is supplied (§6.3, §4.4 step 4).
pub trait TextIndex {
    fn search(
        &self,
        query: &str,
        top_k: usize,
        kinds: &[&str],
        include_global: bool,
        exclude_project_id: Option<&str>,
    ) -> Vec<SearchHit>;
}

impl<F> TextIndex for F
where
    F: Fn(&str, usize, &[&str], bool, Option<&str>) -> Vec<SearchHit>,
{
    fn search(
        &self,
        query: &str,
        top_k: usize,
        kinds: &[&str],
        include_global: bool,
        exclude_project_id: Option<&str>,
    ) -> Vec<SearchHit> {
        self(query, top_k, kinds, include_global, exclude_project_id)
    }
}

/// The result of one [`MindProvider::call`].
#[derive(Debug, Clone)]
pub struct MindResponse {
    pub obj: serde_json::Value,
    pub transcript_path: PathBuf,
}

/// A reasoning-model call used only by WhyTrace and higher-layer mining
/// pipelines (§6.3).
pub trait MindProvider {
    fn call(&self, schema_filename: &str, prompt: &str, tag: &str) -> Result<MindResponse>;
}

impl<F> MindProvider for F
where
    F: Fn(&str, &str, &str) -> Result<MindResponse>,
{
    fn call(&self, schema_filename: &str, prompt: &str, tag: &str) -> Result<MindResponse> {
        self(schema_filename, prompt, tag)
    }
}
