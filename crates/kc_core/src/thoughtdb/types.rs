//! ThoughtDB record types: claims, nodes, edges, and their retractions.

use serde::{Deserialize, Serialize};

/// Maximum tags kept on a claim, node, or edge.
pub const MAX_TAGS: usize = 20;
/// Maximum `source_refs` kept on a claim or edge.
pub const MAX_SOURCE_REFS_CLAIM: usize = 8;
/// Maximum `source_refs` kept on a node (nodes tend to cite more evidence).
pub const MAX_SOURCE_REFS_NODE: usize = 12;
/// Maximum length of a node title, in characters.
pub const MAX_TITLE_LEN: usize = 140;

/// `scope` for a claim, node, or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Project,
    Global,
}

impl Scope {
    /// Parses a scope from its wire string, if valid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project" => Some(Self::Project),
            "global" => Some(Self::Global),
            _ => None,
        }
    }

    /// The wire representation of this scope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Global => "global",
        }
    }
}

/// Visibility of a claim, node, or edge. Ordered `Private < Project < Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Project,
    Global,
}

impl Visibility {
    /// Parses a visibility from its wire string, if valid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "project" => Some(Self::Project),
            "global" => Some(Self::Global),
            _ => None,
        }
    }

    /// The most restrictive of two visibilities (used when clamping edge
    /// visibility to its endpoints, invariant 8).
    pub fn most_restrictive(a: Self, b: Self) -> Self {
        a.min(b)
    }
}

/// `claim_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Fact,
    Preference,
    Assumption,
    Goal,
}

impl ClaimType {
    /// Parses a claim type from its wire string, if valid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(Self::Fact),
            "preference" => Some(Self::Preference),
            "assumption" => Some(Self::Assumption),
            "goal" => Some(Self::Goal),
            _ => None,
        }
    }

    /// True for the two claim types retrieval treats as "pref/goal" claims.
    pub fn is_preference_or_goal(self) -> bool {
        matches!(self, Self::Preference | Self::Goal)
    }
}

/// `node_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Decision,
    Action,
    Summary,
}

impl NodeType {
    /// Parses a node type from its wire string, if valid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(Self::Decision),
            "action" => Some(Self::Action),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }
}

/// `edge_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    DependsOn,
    Supports,
    Contradicts,
    DerivedFrom,
    Mentions,
    Supersedes,
    SameAs,
}

impl EdgeType {
    /// Parses an edge type from its wire string, if valid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "depends_on" => Some(Self::DependsOn),
            "supports" => Some(Self::Supports),
            "contradicts" => Some(Self::Contradicts),
            "derived_from" => Some(Self::DerivedFrom),
            "mentions" => Some(Self::Mentions),
            "supersedes" => Some(Self::Supersedes),
            "same_as" => Some(Self::SameAs),
            _ => None,
        }
    }

    /// The wire representation of this edge type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DependsOn => "depends_on",
            Self::Supports => "supports",
            Self::Contradicts => "contradicts",
            Self::DerivedFrom => "derived_from",
            Self::Mentions => "mentions",
            Self::Supersedes => "supersedes",
            Self::SameAs => "same_as",
        }
    }

    /// Edge types walked by retrieval's one-hop expansion (§4.4 step 9).
    pub fn retrieval_expansion_types() -> [EdgeType; 7] {
        [
            Self::DependsOn,
            Self::Supports,
            Self::Contradicts,
            Self::DerivedFrom,
            Self::Mentions,
            Self::Supersedes,
            Self::SameAs,
        ]
    }
}

/// Derived status of a claim or node (invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Superseded,
    Retracted,
    Unknown,
}

/// A citation into the EvidenceLog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Always `"evidence_event"` today; kept as a string for forward
    /// compatibility with future citation kinds.
    pub kind: String,
    /// The cited `event_id`.
    pub event_id: String,
}

impl SourceRef {
    /// Builds an evidence-event source ref.
    pub fn evidence_event(event_id: impl Into<String>) -> Self {
        Self {
            kind: "evidence_event".to_string(),
            event_id: event_id.into(),
        }
    }
}

/// A proposition asserted at a point in time, optionally valid over an
/// interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub claim_type: ClaimType,
    pub text: String,
    pub scope: Scope,
    #[serde(default)]
    pub project_id: String,
    pub visibility: Visibility,
    pub asserted_ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_refs: Vec<SourceRef>,
    pub confidence: f64,
    #[serde(default)]
    pub notes: String,
    pub version: String,
}

/// Appending one of these marks the referenced claim retracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRetract {
    pub claim_id: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub source_refs: Vec<SourceRef>,
    pub ts: String,
}

/// One line of `claims.jsonl`: either a creation or a retraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClaimRecord {
    #[serde(rename = "claim")]
    Claim(Claim),
    #[serde(rename = "claim_retract")]
    ClaimRetract(ClaimRetract),
}

/// A Decision/Action/Summary document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    pub node_type: NodeType,
    pub title: String,
    pub text: String,
    pub scope: Scope,
    #[serde(default)]
    pub project_id: String,
    pub visibility: Visibility,
    pub asserted_ts: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_refs: Vec<SourceRef>,
    pub confidence: f64,
    #[serde(default)]
    pub notes: String,
    pub version: String,
}

/// Appending one of these marks the referenced node retracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRetract {
    pub node_id: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub source_refs: Vec<SourceRef>,
    pub ts: String,
}

/// One line of `nodes.jsonl`: either a creation or a retraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeRecord {
    #[serde(rename = "node")]
    Node(Node),
    #[serde(rename = "node_retract")]
    NodeRetract(NodeRetract),
}

/// A typed directed relation between two ids (claim/node/event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub edge_id: String,
    pub edge_type: EdgeType,
    pub from_id: String,
    pub to_id: String,
    pub scope: Scope,
    #[serde(default)]
    pub project_id: String,
    pub visibility: Visibility,
    pub asserted_ts: String,
    #[serde(default)]
    pub source_refs: Vec<SourceRef>,
    #[serde(default)]
    pub notes: String,
    pub version: String,
}

fn clamp_vec<T>(mut v: Vec<T>, max: usize) -> Vec<T> {
    v.truncate(max);
    v
}

/// Lowercases tags and truncates the list to [`MAX_TAGS`].
pub fn clamp_tags(tags: Vec<String>) -> Vec<String> {
    let lowered: Vec<String> = tags.into_iter().map(|t| t.to_lowercase()).collect();
    clamp_vec(lowered, MAX_TAGS)
}

/// Truncates `source_refs` to `max`.
pub fn clamp_source_refs(refs: Vec<SourceRef>, max: usize) -> Vec<SourceRef> {
    clamp_vec(refs, max)
}

/// Truncates a title to [`MAX_TITLE_LEN`] characters (char-boundary safe).
pub fn clamp_title(title: &str) -> String {
    truncate_chars(title, MAX_TITLE_LEN)
}

/// Truncates `s` to at most `max_chars` characters, respecting UTF-8
/// boundaries.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
