//! Operational defaults & values policy layer (§4.9, component J).
//!
//! A thin layer above ThoughtDB: resolves named settings from tagged
//! preference/goal claims (project overrides global) and seeds defaults as
//! claims when absent. Performs no I/O beyond ThoughtDB appends; never
//! talks to a model or a text index.

use crate::error::Result;
use crate::thoughtdb::{signature, ClaimType, NewClaim, Scope, Status, Store, View, Visibility};
use chrono::Utc;
use serde::Serialize;

/// Tag for the `ask_when_uncertain` setting.
pub const TAG_ASK_WHEN_UNCERTAIN: &str = "mi:setting:ask_when_uncertain";
/// Tag for the `refactor_intent` setting.
pub const TAG_REFACTOR_INTENT: &str = "mi:setting:refactor_intent";
/// Tag for the `testless_verification_strategy` setting.
pub const TAG_TESTLESS_VERIFICATION_STRATEGY: &str = "mi:testless_verification_strategy";

/// Marker tag applied to every claim seeded by [`seed_defaults`].
pub const TAG_DEFAULTS: &str = "mi:defaults";

/// A setting resolved from a tagged claim, with the scope it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSetting {
    pub text: String,
    pub scope: Scope,
}

/// Resolves a setting `tag`: newest active, temporally-valid claim tagged
/// with it in `view_project`; falls back to `view_global` if the project
/// has none.
pub fn resolve_setting(view_project: &View, view_global: &View, tag: &str) -> Option<ResolvedSetting> {
    let now = Utc::now();
    if let Some(claim) = newest_active_valid_tagged(view_project, tag, &now) {
        return Some(ResolvedSetting {
            text: claim.text.clone(),
            scope: Scope::Project,
        });
    }
    if let Some(claim) = newest_active_valid_tagged(view_global, tag, &now) {
        return Some(ResolvedSetting {
            text: claim.text.clone(),
            scope: Scope::Global,
        });
    }
    None
}

fn newest_active_valid_tagged<'a>(
    view: &'a View,
    tag: &str,
    as_of: &chrono::DateTime<Utc>,
) -> Option<&'a crate::thoughtdb::Claim> {
    view.claim_ids_by_asserted_ts_desc.iter().find_map(|id| {
        let claim = view.claims_by_id.get(id)?;
        if !claim.tags.iter().any(|t| t == tag) {
            return None;
        }
        if view.claim_status(id) != Status::Active {
            return None;
        }
        if !crate::thoughtdb::view::temporally_valid(
            claim.valid_from.as_deref(),
            claim.valid_to.as_deref(),
            as_of,
        ) {
            return None;
        }
        Some(claim)
    })
}

/// One default setting to seed if absent.
#[derive(Debug, Clone)]
pub struct DefaultSpec {
    pub tag: &'static str,
    pub claim_type: ClaimType,
    pub text: String,
}

/// Result of [`seed_defaults`]: which tags were newly seeded vs. already
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub seeded: Vec<String>,
    pub already_present: Vec<String>,
}

/// Appends a claim for every `default` whose signature isn't already
/// present in `scope`. Seeded claims cite no events (operational defaults
/// are not evidence-backed) and are tagged with the setting's tag plus
/// [`TAG_DEFAULTS`].
pub fn seed_defaults(
    store: &Store,
    view: &View,
    scope: Scope,
    project_id: &str,
    defaults: &[DefaultSpec],
) -> Result<SeedReport> {
    let existing = signature::existing_signature_map(view);
    let visibility = match scope {
        Scope::Project => Visibility::Project,
        Scope::Global => Visibility::Global,
    };

    let mut report = SeedReport::default();
    for default in defaults {
        let sig = signature::claim_signature(default.claim_type, scope, project_id, &default.text);
        if existing.contains_key(&sig) {
            report.already_present.push(default.tag.to_string());
            continue;
        }

        let input = NewClaim {
            claim_type: default.claim_type,
            text: default.text.clone(),
            scope,
            project_id: project_id.to_string(),
            visibility,
            valid_from: None,
            valid_to: None,
            tags: vec![default.tag.to_string(), TAG_DEFAULTS.to_string()],
            source_refs: vec![],
            confidence: 1.0,
            notes: String::new(),
        };
        store.create_claim(view, input)?;
        report.seeded.push(default.tag.to_string());
    }
    Ok(report)
}
