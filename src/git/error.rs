//! Error types and formatting
//!
//! - **`GitError`** - typed domain errors that can be pattern-matched and
//!   tested. Use `.into()` to convert to `anyhow::Error` while preserving the
//!   type for `downcast_ref`. Display produces styled output for users.
//!
//! - **`WtportError`** - semantic errors that need special handling at the
//!   process boundary (exit codes, already-printed failures).

use std::path::PathBuf;

use color_print::cformat;

use crate::path::format_path_for_display;
use crate::styling::{error_message, hint_message, suggest_command};

/// Process exit code for a merge that stopped on conflicts.
pub const EXIT_CONFLICT: i32 = 1;
/// Process exit code when the operation was never attempted or failed.
pub const EXIT_FAILURE: i32 = 2;

/// Which checkout holds uncommitted changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeLocation {
    Main,
    Worktree,
}

/// Coarse error classification carried by `MergeOutcome::Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    NotARepository,
    WorktreeNotFound,
    SnapshotPersistenceFailed,
    EngineError,
    Configuration,
}

#[derive(Debug, Clone)]
pub enum GitError {
    NotARepository {
        path: PathBuf,
        detail: Option<String>,
    },
    WorktreeNotFound {
        name: String,
    },
    DetachedHead {
        worktree: Option<String>,
    },
    SnapshotPersistenceFailed {
        path: PathBuf,
        message: String,
    },
    SnapshotNotFound {
        id: String,
    },
    MergeConflict {
        branch: String,
        paths: Vec<String>,
    },
    /// The version-control engine failed in a way nothing upstream expects.
    EngineError {
        command: String,
        message: String,
    },
    ParseError(String),
}

impl GitError {
    /// Classification used when the error ends an orchestrated merge.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GitError::NotARepository { .. } => ErrorKind::NotARepository,
            GitError::WorktreeNotFound { .. } => ErrorKind::WorktreeNotFound,
            GitError::SnapshotPersistenceFailed { .. } | GitError::SnapshotNotFound { .. } => {
                ErrorKind::SnapshotPersistenceFailed
            }
            _ => ErrorKind::EngineError,
        }
    }

    /// The headline without styling or hint, for callers that present it
    /// themselves.
    pub fn plain_message(&self) -> String {
        match self {
            GitError::NotARepository { path, detail } => {
                let path = format_path_for_display(path);
                match detail {
                    Some(detail) => format!("{path} is not inside a git repository: {detail}"),
                    None => format!("{path} is not inside a git repository"),
                }
            }
            GitError::WorktreeNotFound { name } => format!("No worktree found for {name}"),
            GitError::DetachedHead { worktree: Some(name) } => {
                format!("{name} is not on a branch (detached HEAD)")
            }
            GitError::DetachedHead { worktree: None } => {
                "Not on a branch (detached HEAD)".to_string()
            }
            GitError::SnapshotPersistenceFailed { path, message } => format!(
                "Could not write safety snapshot to {}: {message}",
                format_path_for_display(path)
            ),
            GitError::SnapshotNotFound { id } => format!("No backup with id {id}"),
            GitError::MergeConflict { branch, paths } => format!(
                "Merging {branch} stopped with conflicts in {} file(s)",
                paths.len()
            ),
            GitError::EngineError { command, message } => match message.trim() {
                "" => format!("{command} failed"),
                detail => format!("{command} failed: {detail}"),
            },
            GitError::ParseError(message) => format!("Unexpected git output: {message}"),
        }
    }

    /// Suggested next step, unstyled.
    pub fn hint(&self) -> Option<String> {
        let hint = match self {
            GitError::NotARepository { .. } => "Run from a checkout, or pass -C PATH".to_string(),
            GitError::WorktreeNotFound { .. } => {
                "To list worktrees, run git worktree list".to_string()
            }
            GitError::DetachedHead { .. } => {
                "To switch to a branch, run git switch BRANCH".to_string()
            }
            GitError::SnapshotPersistenceFailed { .. } => {
                "Check disk space and permissions, or pass --force to merge without one"
                    .to_string()
            }
            GitError::SnapshotNotFound { .. } => format!(
                "To list backups, run {}",
                suggest_command("backup list", &[], &[])
            ),
            GitError::MergeConflict { .. } => {
                "Resolve the conflicts and run git commit, or git merge --abort".to_string()
            }
            GitError::EngineError { .. } | GitError::ParseError(_) => return None,
        };
        Some(hint)
    }
}

/// Plain one-line description of any error, preferring the typed headline.
pub fn plain_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<GitError>() {
        Some(git_err) => git_err.plain_message(),
        None => format!("{err:#}"),
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::NotARepository { path, detail } => {
                let path = format_path_for_display(path);
                let message = match detail {
                    Some(detail) => cformat!("<bold>{path}</> is not inside a git repository: {detail}"),
                    None => cformat!("<bold>{path}</> is not inside a git repository"),
                };
                write!(
                    f,
                    "{}\n{}",
                    error_message(message),
                    hint_message(cformat!(
                        "Run from a checkout, or pass <bright-black>-C PATH</>"
                    ))
                )
            }

            GitError::WorktreeNotFound { name } => write!(
                f,
                "{}\n{}",
                error_message(cformat!("No worktree found for <bold>{name}</>")),
                hint_message(cformat!(
                    "To list worktrees, run <bright-black>git worktree list</>"
                ))
            ),

            GitError::DetachedHead { worktree } => {
                let message = match worktree {
                    Some(name) => cformat!("<bold>{name}</> is not on a branch (detached HEAD)"),
                    None => "Not on a branch (detached HEAD)".to_string(),
                };
                write!(
                    f,
                    "{}\n{}",
                    error_message(message),
                    hint_message(cformat!(
                        "To switch to a branch, run <bright-black>git switch BRANCH</>"
                    ))
                )
            }

            GitError::SnapshotPersistenceFailed { path, message } => write!(
                f,
                "{}\n{}",
                error_message(cformat!(
                    "Could not write safety snapshot to <bold>{}</>: {message}",
                    format_path_for_display(path)
                )),
                hint_message("Check disk space and permissions, or pass --force to merge without one")
            ),

            GitError::SnapshotNotFound { id } => write!(
                f,
                "{}\n{}",
                error_message(cformat!("No backup with id <bold>{id}</>")),
                hint_message(cformat!(
                    "To list backups, run <bright-black>{}</>",
                    suggest_command("backup list", &[], &[])
                ))
            ),

            GitError::MergeConflict { branch, paths } => {
                let count = paths.len();
                write!(
                    f,
                    "{}\n{}",
                    error_message(cformat!(
                        "Merging <bold>{branch}</> stopped with conflicts in {count} file(s)"
                    )),
                    hint_message(cformat!(
                        "Resolve the conflicts and run <bright-black>git commit</>, or <bright-black>git merge --abort</>"
                    ))
                )
            }

            GitError::EngineError { command, message } => {
                let detail = message.trim();
                if detail.is_empty() {
                    write!(f, "{}", error_message(cformat!("<bold>{command}</> failed")))
                } else {
                    write!(
                        f,
                        "{}\n{}",
                        error_message(cformat!("<bold>{command}</> failed")),
                        hint_message(detail)
                    )
                }
            }

            GitError::ParseError(message) => {
                write!(f, "{}", error_message(format!("Unexpected git output: {message}")))
            }
        }
    }
}

impl std::error::Error for GitError {}

/// Errors that carry process-boundary semantics rather than domain meaning.
#[derive(Debug)]
pub enum WtportError {
    /// Error already displayed, just exit with the given code
    AlreadyDisplayed { exit_code: i32 },
}

impl std::fmt::Display for WtportError {
    fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WtportError::AlreadyDisplayed { .. } => Ok(()),
        }
    }
}

impl std::error::Error for WtportError {}

/// Extract an exit code from a `WtportError`, if applicable
pub fn exit_code(err: &anyhow::Error) -> Option<i32> {
    err.downcast_ref::<WtportError>().map(|e| match e {
        WtportError::AlreadyDisplayed { exit_code } => *exit_code,
    })
}
