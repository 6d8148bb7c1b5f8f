//! Persisted per-project state
//!
//! The only state that outlives an invocation: the flake history and the
//! prior coverage snapshot, keyed by project and branch. Fields are additive;
//! every one carries a serde default so older documents keep loading.

pub mod store;

pub use store::{HistoryStore, JsonFileStore, MemoryStore, StateMutation};

use crate::coverage::CoverageMetrics;
use crate::flake::FlakeHistory;
use crate::verdict::VerdictLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller-supplied identity of a history
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub project: String,
    pub branch: String,
}

impl StateKey {
    pub fn new(project: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            branch: branch.into(),
        }
    }

    /// Filesystem-safe name, unique per key
    ///
    /// Sanitizing alone would map `feature/x` and `feature_x` to the same
    /// name, so a short hash of the raw key is appended.
    pub fn file_stem(&self) -> String {
        let hash = blake3::hash(self.to_string().as_bytes()).to_hex();
        format!(
            "{}__{}-{}",
            sanitize(&self.project),
            sanitize(&self.branch),
            &hash.as_str()[..12]
        )
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.project, self.branch)
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Everything persisted for one project/branch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectState {
    pub flake_history: FlakeHistory,
    /// Coverage of the most recent evaluated run; base for deltas
    pub last_coverage: Option<CoverageMetrics>,
    pub runs_recorded: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_run_id: Option<Uuid>,
    pub last_verdict: Option<VerdictLevel>,
}
