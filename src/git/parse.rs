//! Git output parsing functions

use std::path::PathBuf;

use super::{GitError, WorktreeRecord};

impl WorktreeRecord {
    /// Parse `git worktree list --porcelain`.
    pub(crate) fn parse_porcelain_list(output: &str) -> Result<Vec<Self>, GitError> {
        let mut worktrees = Vec::new();
        let mut current: Option<WorktreeRecord> = None;

        for line in output.lines() {
            if line.is_empty() {
                if let Some(wt) = current.take() {
                    worktrees.push(wt);
                }
                continue;
            }

            let (key, value) = match line.split_once(' ') {
                Some((k, v)) => (k, Some(v)),
                None => (line, None),
            };

            if key == "worktree" {
                let path = value
                    .ok_or_else(|| GitError::ParseError("worktree line missing path".to_string()))?;
                if let Some(wt) = current.take() {
                    worktrees.push(wt);
                }
                current = Some(WorktreeRecord {
                    path: PathBuf::from(path),
                    branch: None,
                    head: String::new(),
                    bare: false,
                    locked: None,
                    prunable: None,
                    registered: true,
                });
                continue;
            }

            match (key, current.as_mut()) {
                ("HEAD", Some(wt)) => {
                    wt.head = value
                        .ok_or_else(|| GitError::ParseError("HEAD line missing SHA".to_string()))?
                        .to_string();
                }
                ("branch", Some(wt)) => {
                    let branch_ref = value.ok_or_else(|| {
                        GitError::ParseError("branch line missing ref".to_string())
                    })?;
                    let branch = branch_ref.strip_prefix("refs/heads/").unwrap_or(branch_ref);
                    wt.branch = Some(branch.to_string());
                }
                ("bare", Some(wt)) => wt.bare = true,
                ("detached", Some(wt)) => wt.branch = None,
                ("locked", Some(wt)) => wt.locked = Some(value.unwrap_or_default().to_string()),
                ("prunable", Some(wt)) => {
                    wt.prunable = Some(value.unwrap_or_default().to_string())
                }
                // Unknown attributes, or attributes before the first worktree
                _ => {}
            }
        }

        if let Some(wt) = current {
            worktrees.push(wt);
        }

        Ok(worktrees)
    }
}

/// Parse `git status --porcelain -z` into changed paths.
///
/// Rename and copy entries carry the original path as a second NUL-separated
/// field; only the destination is reported.
pub(crate) fn parse_status_z(output: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut entries = output.split('\0').filter(|e| !e.is_empty());

    while let Some(entry) = entries.next() {
        if entry.len() < 4 {
            continue;
        }
        let (code, path) = entry.split_at(3);
        paths.push(path.to_string());
        if code.contains('R') || code.contains('C') {
            entries.next();
        }
    }

    paths
}

/// Recognize a conflicted merge from git's human-readable output.
///
/// Returns `None` when the text shows no sign of a conflict. Otherwise
/// returns the conflicted paths that could be read off `CONFLICT` lines,
/// which may be empty when git reported the conflict without naming files
/// (the caller should then consult the index).
pub fn conflicted_paths(output: &str) -> Option<Vec<String>> {
    let mut saw_conflict = false;
    let mut paths = Vec::new();

    for line in output.lines().map(str::trim) {
        if line.starts_with("Automatic merge failed") {
            saw_conflict = true;
            continue;
        }
        let Some(rest) = line.strip_prefix("CONFLICT (") else {
            continue;
        };
        saw_conflict = true;

        let Some((_, detail)) = rest.split_once("): ") else {
            continue;
        };
        let path = if let Some(path) = detail.strip_prefix("Merge conflict in ") {
            Some(path)
        } else {
            // "<path> deleted in <side> and modified in <side>. ..."
            detail.split_once(" deleted in ").map(|(path, _)| path)
        };
        if let Some(path) = path
            && !paths.iter().any(|p| p == path)
        {
            paths.push(path.to_string());
        }
    }

    saw_conflict.then_some(paths)
}

/// Branch name from `git symbolic-ref refs/remotes/<remote>/HEAD`.
pub(crate) fn remote_head_branch(remote: &str, output: &str) -> Option<String> {
    let trimmed = output.trim();
    let prefix = format!("refs/remotes/{remote}/");
    let branch = trimmed.strip_prefix(&prefix).unwrap_or(trimmed);
    (!branch.is_empty()).then(|| branch.to_string())
}
