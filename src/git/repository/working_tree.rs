//! Working-tree state and the commands that mutate it.

use super::Repository;
use crate::git::parse::{conflicted_paths, parse_status_z};
use crate::git::{GitError, MergeAttempt, WorkingTreeStatus};

/// How `reset` treats local modifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ResetMode {
    /// Discard index and working-tree changes.
    Hard,
    /// Move HEAD but refuse if a local modification would be overwritten.
    Keep,
}

impl Repository {
    /// All uncommitted changes, untracked files included.
    pub fn status(&self) -> anyhow::Result<WorkingTreeStatus> {
        let stdout = self.run_command(&["status", "--porcelain", "-z"])?;
        Ok(WorkingTreeStatus {
            changed_paths: parse_status_z(&stdout),
        })
    }

    /// Tracked files that differ from HEAD (staged or not). Untracked files
    /// are ignored.
    pub fn tracked_status(&self) -> anyhow::Result<WorkingTreeStatus> {
        let stdout = self.run_command(&["status", "--porcelain", "-z", "--untracked-files=no"])?;
        Ok(WorkingTreeStatus {
            changed_paths: parse_status_z(&stdout),
        })
    }

    pub fn checkout(&self, branch: &str) -> anyhow::Result<()> {
        self.run_command(&["checkout", "--quiet", branch])?;
        Ok(())
    }

    pub fn checkout_detached(&self, commit: &str) -> anyhow::Result<()> {
        self.run_command(&["checkout", "--quiet", "--detach", commit])?;
        Ok(())
    }

    pub fn reset(&self, mode: ResetMode, commit: &str) -> anyhow::Result<()> {
        let flag = format!("--{}", mode.as_ref());
        self.run_command(&["reset", "--quiet", &flag, commit])?;
        Ok(())
    }

    /// Merge `branch` into the checked-out branch.
    ///
    /// A conflicted merge is a normal result, not an error: the index and
    /// working tree are left exactly as git produced them. Any other
    /// failure is a [`GitError::EngineError`].
    pub fn merge(&self, branch: &str) -> anyhow::Result<MergeAttempt> {
        let before = self.head_commit()?;
        let args = ["merge", "--no-edit", branch];
        let output = self.run_command_output(&args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let commit = self.head_commit()?;
            // Up to date, or HEAD moved along the branch without a merge commit
            let fast_forward = commit == before || self.is_ancestor(&before, branch)?;
            return Ok(MergeAttempt::Merged {
                fast_forward,
                commit,
            });
        }

        for line in stderr.trim().lines() {
            log::debug!("  ! {}", line);
        }

        let combined = format!("{stdout}\n{stderr}");
        let unmerged = self.unmerged_paths()?;
        match conflicted_paths(&combined) {
            // The index is authoritative; the text only names what it can
            Some(paths) => Ok(MergeAttempt::Conflicted {
                paths: if unmerged.is_empty() { paths } else { unmerged },
            }),
            // Localized git output: the index still tells the truth
            None if !unmerged.is_empty() && self.is_merging()? => {
                Ok(MergeAttempt::Conflicted { paths: unmerged })
            }
            None => Err(GitError::EngineError {
                command: format!("git {}", args.join(" ")),
                message: [stderr.trim(), stdout.trim()]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n"),
            }
            .into()),
        }
    }

    /// Paths with unresolved conflicts in the index.
    pub fn unmerged_paths(&self) -> anyhow::Result<Vec<String>> {
        let stdout = self.run_command(&["diff", "--name-only", "--diff-filter=U", "-z"])?;
        let mut paths: Vec<String> = stdout
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        paths.dedup();
        Ok(paths)
    }

    /// Record uncommitted tracked changes as a dangling stash commit without
    /// touching the working tree. `None` when there is nothing to save.
    pub fn stash_create(&self, message: &str) -> anyhow::Result<Option<String>> {
        let stdout = self.run_command(&["stash", "create", message])?;
        let sha = stdout.trim();
        Ok((!sha.is_empty()).then(|| sha.to_string()))
    }

    pub fn stash_apply(&self, sha: &str) -> anyhow::Result<()> {
        self.run_command(&["stash", "apply", "--quiet", sha])?;
        Ok(())
    }

    /// Point `refname` at `sha`, recording a reflog entry so the commit
    /// stays reachable even if the ref is later overwritten.
    pub fn update_ref(&self, refname: &str, sha: &str, message: &str) -> anyhow::Result<()> {
        self.run_command(&["update-ref", "--create-reflog", "-m", message, refname, sha])?;
        Ok(())
    }

    /// Binary-safe patch of uncommitted tracked changes against HEAD.
    pub fn uncommitted_patch(&self) -> anyhow::Result<String> {
        self.run_command(&["diff", "HEAD", "--binary", "--no-color", "--no-ext-diff"])
    }
}
