//! Configuration for retrieval budgets, WhyTrace tuning, and compaction
//! policy. TOML-backed, loaded from `<home>/config.toml` if present.

use crate::error::{KcError, Result};
use crate::retrieval::Budgets;
use crate::why_trace::WhyTraceConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration for a Knowledge Core home directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Retrieval (`decide_next` context builder) budgets.
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// WhyTrace candidate cap and write-confidence threshold.
    #[serde(default)]
    pub why_trace: WhyTraceSettings,

    /// Compaction archive format and dry-run default.
    #[serde(default)]
    pub compaction: CompactionSettings,
}

impl Config {
    /// Loads configuration from `<home>/config.toml`, or returns defaults if
    /// absent.
    pub fn load(home: &Path) -> Result<Self> {
        let path = home.join("config.toml");
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| KcError::ConfigError(format!("failed to read config: {e}")))?;
            toml::from_str(&content)
                .map_err(|e| KcError::ConfigError(format!("failed to parse config: {e}")))
        } else {
            Ok(Config::default())
        }
    }

    /// Saves configuration to `<home>/config.toml`.
    pub fn save(&self, home: &Path) -> Result<()> {
        let path = home.join("config.toml");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| KcError::ConfigError(format!("failed to serialize config: {e}")))?;
        fs::write(&path, content)?;
        Ok(())
    }
}

/// Retrieval budgets (§4.4), TOML-serializable mirror of [`Budgets`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub max_nodes: usize,
    pub max_values_claims: usize,
    pub max_pref_goal_claims: usize,
    pub max_query_claims: usize,
    pub max_edges: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let b = Budgets::default();
        Self {
            max_nodes: b.max_nodes,
            max_values_claims: b.max_values_claims,
            max_pref_goal_claims: b.max_pref_goal_claims,
            max_query_claims: b.max_query_claims,
            max_edges: b.max_edges,
        }
    }
}

impl From<RetrievalSettings> for Budgets {
    fn from(s: RetrievalSettings) -> Self {
        Budgets {
            max_nodes: s.max_nodes,
            max_values_claims: s.max_values_claims,
            max_pref_goal_claims: s.max_pref_goal_claims,
            max_query_claims: s.max_query_claims,
            max_edges: s.max_edges,
        }
    }
}

/// WhyTrace tuning (§4.5), TOML-serializable mirror of [`WhyTraceConfig`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WhyTraceSettings {
    pub top_k: usize,
    pub min_write_confidence: f64,
}

impl Default for WhyTraceSettings {
    fn default() -> Self {
        let c = WhyTraceConfig::default();
        Self {
            top_k: c.top_k,
            min_write_confidence: c.min_write_confidence,
        }
    }
}

impl From<WhyTraceSettings> for WhyTraceConfig {
    fn from(s: WhyTraceSettings) -> Self {
        WhyTraceConfig {
            top_k: s.top_k,
            min_write_confidence: s.min_write_confidence,
        }
    }
}

/// Compaction policy (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionSettings {
    /// Run compaction in dry-run mode by default (plan only, no writes).
    pub dry_run_default: bool,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            dry_run_default: false,
        }
    }
}
