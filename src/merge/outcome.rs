use std::path::PathBuf;

use color_print::cformat;

use crate::git::{EXIT_CONFLICT, EXIT_FAILURE, ErrorKind, GitError};
use crate::predict::ConflictPrediction;
use crate::validate::ValidationIssue;

/// Steps of an orchestrated merge, in the order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Phase {
    Resolving,
    Validating,
    Predicting,
    Snapshotting,
    Merging,
    Succeeded,
    Conflicted,
    Failed,
    CleaningUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DecisionKind {
    PredictedConflicts,
    PushUnpushed,
    DeleteAfterMerge,
}

/// A question only the caller can answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionRequest {
    /// Merge even though conflicts are predicted?
    PredictedConflicts {
        branch: String,
        main_branch: String,
        predictions: Vec<ConflictPrediction>,
    },
    /// Push the branch's unpushed commits before merging?
    PushUnpushed {
        branch: String,
        upstream: String,
        count: usize,
    },
    /// Remove the worktree, its branch and its ports now that the merge landed?
    DeleteAfterMerge {
        worktree_name: String,
        branch: String,
        path: PathBuf,
    },
}

impl DecisionRequest {
    pub fn kind(&self) -> DecisionKind {
        match self {
            DecisionRequest::PredictedConflicts { .. } => DecisionKind::PredictedConflicts,
            DecisionRequest::PushUnpushed { .. } => DecisionKind::PushUnpushed,
            DecisionRequest::DeleteAfterMerge { .. } => DecisionKind::DeleteAfterMerge,
        }
    }

    /// One-line yes/no question for an interactive caller.
    pub fn question(&self) -> String {
        match self {
            DecisionRequest::PredictedConflicts {
                branch,
                predictions,
                ..
            } => {
                let count = predictions.len();
                let noun = if count == 1 { "file" } else { "files" };
                cformat!("Merge <bold>{branch}</> anyway? ({count} {noun} may conflict)")
            }
            DecisionRequest::PushUnpushed {
                branch,
                upstream,
                count,
            } => cformat!("Push {count} unpushed commit(s) on <bold>{branch}</> to <bold>{upstream}</> first?"),
            DecisionRequest::DeleteAfterMerge { worktree_name, .. } => {
                cformat!("Remove worktree <bold>{worktree_name}</> and its branch?")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

impl From<bool> for Decision {
    fn from(approved: bool) -> Self {
        if approved {
            Decision::Approve
        } else {
            Decision::Decline
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSuccess {
    pub branch: String,
    pub main_branch: String,
    pub cleaned_up: bool,
    pub fast_forward: bool,
    pub snapshot_id: Option<String>,
    /// Non-fatal findings: validation warnings and best-effort failures.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Succeeded(MergeSuccess),
    /// Stopped with conflicts; the main checkout is left mid-merge.
    Conflicted {
        branch: String,
        /// `None` when git reported a conflict without naming files.
        conflict_count: Option<usize>,
        paths: Vec<String>,
        snapshot_id: Option<String>,
        /// Whether the merge-state record was written.
        state_saved: bool,
    },
    ValidationFailed(Vec<ValidationIssue>),
    /// Result of a `check` run: nothing was snapshotted or merged.
    Preview(Vec<ConflictPrediction>),
    Declined(DecisionKind),
    Error {
        kind: ErrorKind,
        /// Plain headline; styling is left to the caller.
        message: String,
        hint: Option<String>,
    },
}

impl MergeOutcome {
    /// `0` success or clean preview, `1` conflicts (real or predicted),
    /// `2` anything that kept the merge from happening.
    pub fn exit_code(&self) -> i32 {
        match self {
            MergeOutcome::Succeeded(_) => 0,
            MergeOutcome::Preview(predictions) if predictions.is_empty() => 0,
            MergeOutcome::Preview(_) | MergeOutcome::Conflicted { .. } => EXIT_CONFLICT,
            MergeOutcome::ValidationFailed(_)
            | MergeOutcome::Declined(_)
            | MergeOutcome::Error { .. } => EXIT_FAILURE,
        }
    }

    /// Build the terminal outcome for an unexpected failure.
    pub fn from_error(err: &anyhow::Error) -> Self {
        if let Some(git_err) = err.downcast_ref::<GitError>() {
            return MergeOutcome::Error {
                kind: git_err.kind(),
                message: git_err.plain_message(),
                hint: git_err.hint(),
            };
        }
        let kind = if err.downcast_ref::<config::ConfigError>().is_some() {
            ErrorKind::Configuration
        } else {
            ErrorKind::EngineError
        };
        MergeOutcome::Error {
            kind,
            message: format!("{err:#}"),
            hint: None,
        }
    }
}
