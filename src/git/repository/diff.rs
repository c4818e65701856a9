//! Read-only history comparisons.

use std::collections::BTreeMap;

use super::Repository;
use crate::git::{FileDiff, GitError};

impl Repository {
    /// Whether `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> anyhow::Result<bool> {
        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let output = self.run_command_output(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(GitError::EngineError {
                command: format!("git {}", args.join(" ")),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into()),
        }
    }

    pub fn merge_base(&self, a: &str, b: &str) -> anyhow::Result<String> {
        let stdout = self.run_command(&["merge-base", a, b])?;
        Ok(stdout.trim().to_string())
    }

    /// Paths that differ between two commits, sorted.
    pub fn changed_files(&self, base: &str, tip: &str) -> anyhow::Result<Vec<String>> {
        let stdout = self.run_command(&["diff", "--name-only", "--no-renames", "-z", base, tip])?;
        let mut files: Vec<String> = stdout
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Per-file hunk ranges (in `base` coordinates) between two commits.
    pub fn diff_hunks(&self, base: &str, tip: &str) -> anyhow::Result<BTreeMap<String, FileDiff>> {
        let stdout = self.run_command(&[
            "-c",
            "core.quotePath=false",
            "diff",
            "--no-color",
            "--no-ext-diff",
            "--no-renames",
            "-U0",
            base,
            tip,
        ])?;
        Ok(FileDiff::parse_zero_context(&stdout))
    }

    /// Blob id of `path` at `rev`, or `None` if the path doesn't exist there.
    pub fn blob_id(&self, rev: &str, path: &str) -> anyhow::Result<Option<String>> {
        let spec = format!("{rev}:{path}");
        let output = self.run_command_output(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !output.status.success() {
            return Ok(None);
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!id.is_empty()).then_some(id))
    }
}
