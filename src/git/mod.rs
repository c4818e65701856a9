//! Git operations and repository management

use std::path::{Path, PathBuf};

mod diff;
mod error;
mod parse;
mod repository;

pub use diff::{FileDiff, LineRange};
pub use error::{
    ChangeLocation, EXIT_CONFLICT, EXIT_FAILURE, ErrorKind, GitError, WtportError, exit_code,
    plain_error,
};
pub use parse::conflicted_paths;
pub use repository::{Repository, ResetMode};

/// One entry of git's worktree registry (or a record synthesized from a
/// live checkout the registry doesn't know about).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WorktreeRecord {
    pub path: PathBuf,
    /// `None` when HEAD is detached.
    pub branch: Option<String>,
    pub head: String,
    pub bare: bool,
    pub locked: Option<String>,
    pub prunable: Option<String>,
    /// False when the record was built from the filesystem rather than the registry.
    pub registered: bool,
}

impl WorktreeRecord {
    /// Directory name of the worktree, which is what users usually type.
    pub fn dir_name(&self) -> Option<&str> {
        crate::path::file_name_str(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of `git status` for one checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    /// Paths relative to the checkout root, in git's order.
    pub changed_paths: Vec<String>,
}

impl WorkingTreeStatus {
    pub fn is_clean(&self) -> bool {
        self.changed_paths.is_empty()
    }
}

/// Structured result of `git merge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAttempt {
    Merged { fast_forward: bool, commit: String },
    /// The merge stopped with unresolved conflicts; the index and working
    /// tree are left as git produced them.
    Conflicted { paths: Vec<String> },
}
