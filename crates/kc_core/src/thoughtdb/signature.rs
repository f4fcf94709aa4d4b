//! Content-based claim deduplication via signatures (invariant 4, §4.3).

use super::types::{ClaimType, Scope};
use super::view::View;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Lowercases, collapses internal whitespace runs to a single space, and
/// trims `text`.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Computes `sha256("{type}|{scope}|{project_id}|{normalized_text}")` as a
/// lowercase hex string.
pub fn claim_signature(
    claim_type: ClaimType,
    scope: Scope,
    project_id: &str,
    text: &str,
) -> String {
    let normalized = normalize_text(text);
    let input = format!(
        "{}|{}|{}|{}",
        claim_type_str(claim_type),
        scope.as_str(),
        project_id,
        normalized
    );
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn claim_type_str(t: ClaimType) -> &'static str {
    match t {
        ClaimType::Fact => "fact",
        ClaimType::Preference => "preference",
        ClaimType::Assumption => "assumption",
        ClaimType::Goal => "goal",
    }
}

/// Returns the set of signatures of every claim in the view, including
/// aliased and inactive claims.
pub fn existing_signatures(view: &View) -> HashSet<String> {
    view.claims_by_id
        .values()
        .map(|c| claim_signature(c.claim_type, c.scope, &c.project_id, &c.text))
        .collect()
}

/// Returns `signature -> canonical claim_id`, skipping any claim that is
/// itself an alias (has an outgoing `same_as` redirect).
pub fn existing_signature_map(view: &View) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for claim in view.claims_by_id.values() {
        if view.redirects_same_as.contains_key(&claim.claim_id) {
            continue;
        }
        let sig = claim_signature(claim.claim_type, claim.scope, &claim.project_id, &claim.text);
        map.entry(sig).or_insert_with(|| claim.claim_id.clone());
    }
    map
}
