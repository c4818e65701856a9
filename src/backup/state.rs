use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a conflicted merge left behind, so a later session can pick it up.
///
/// Only one record exists per repository; the next conflicting merge
/// overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeState {
    pub worktree_name: String,
    pub branch_name: String,
    pub main_branch: String,
    pub conflicted: bool,
    pub timestamp: DateTime<Utc>,
    /// Snapshot taken right before the merge, if any.
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub conflicted_paths: Vec<String>,
}
