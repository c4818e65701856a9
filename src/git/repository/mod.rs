use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::Context;
use once_cell::sync::OnceCell;

use super::GitError;
use super::parse::remote_head_branch;
use crate::shell_exec;

mod diff;
mod working_tree;
mod worktrees;

pub use working_tree::ResetMode;

/// Values that don't change during a process run.
#[derive(Debug, Default)]
struct RepoCache {
    git_dir: OnceCell<PathBuf>,
}

/// Git access bound to one explicit checkout directory.
///
/// Every command runs with `current_dir` set to that directory; nothing here
/// reads the process's working directory. Create one per checkout you need
/// to talk to (the main root, a worktree).
///
/// ```no_run
/// use wtport::git::Repository;
///
/// let repo = Repository::at("/path/to/repo");
/// let branch = repo.current_branch()?;
/// let status = repo.status()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Repository {
    path: PathBuf,
    cache: RepoCache,
}

impl Repository {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RepoCache::default(),
        }
    }

    /// Directory this repository handle runs commands in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `.git` directory of this checkout (for a linked worktree, its
    /// private `.git/worktrees/<name>` directory).
    pub fn git_dir(&self) -> anyhow::Result<&Path> {
        self.cache
            .git_dir
            .get_or_try_init(|| self.resolve_git_path("--git-dir"))
            .map(PathBuf::as_path)
    }

    fn resolve_git_path(&self, flag: &str) -> anyhow::Result<PathBuf> {
        let stdout = self.run_command(&["rev-parse", flag])?;
        let path = PathBuf::from(stdout.trim());
        // git reports these relative to the directory it ran in
        let absolute = if path.is_relative() {
            self.path.join(&path)
        } else {
            path
        };
        Ok(crate::path::canonicalize_or_normalize(&absolute))
    }

    /// Current branch, or `None` when HEAD is detached.
    pub fn current_branch(&self) -> anyhow::Result<Option<String>> {
        let stdout = self.run_command(&["branch", "--show-current"])?;
        let branch = stdout.trim();
        Ok((!branch.is_empty()).then(|| branch.to_string()))
    }

    pub fn head_commit(&self) -> anyhow::Result<String> {
        self.rev_parse("HEAD")
    }

    pub fn rev_parse(&self, rev: &str) -> anyhow::Result<String> {
        let stdout = self.run_command(&["rev-parse", "--verify", "--quiet", rev])?;
        Ok(stdout.trim().to_string())
    }

    pub fn branch_exists(&self, branch: &str) -> anyhow::Result<bool> {
        let refname = format!("refs/heads/{branch}");
        self.run_command_check(&["show-ref", "--verify", "--quiet", &refname])
    }

    /// Delete a branch with `git branch -d`, which refuses unmerged work.
    pub fn delete_branch(&self, branch: &str) -> anyhow::Result<()> {
        self.run_command(&["branch", "-d", branch])?;
        Ok(())
    }

    /// Upstream tracking ref of `branch` (e.g. `origin/feature`), if configured.
    pub fn upstream(&self, branch: &str) -> anyhow::Result<Option<String>> {
        let spec = format!("{branch}@{{upstream}}");
        let output = self.run_command_output(&["rev-parse", "--abbrev-ref", &spec])?;
        if !output.status.success() {
            return Ok(None);
        }
        let upstream = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!upstream.is_empty()).then_some(upstream))
    }

    /// Number of commits on `branch` that `base` doesn't have.
    pub fn ahead_count(&self, base: &str, branch: &str) -> anyhow::Result<usize> {
        let range = format!("{base}..{branch}");
        let stdout = self.run_command(&["rev-list", "--count", &range])?;
        stdout
            .trim()
            .parse()
            .map_err(|_| GitError::ParseError(format!("rev-list count: {}", stdout.trim())).into())
    }

    /// Push the checked-out branch to its upstream.
    pub fn push(&self) -> anyhow::Result<()> {
        self.run_command(&["push"])?;
        Ok(())
    }

    /// Whether a merge is waiting to be concluded in this checkout.
    pub fn is_merging(&self) -> anyhow::Result<bool> {
        Ok(self.git_dir()?.join("MERGE_HEAD").exists())
    }

    /// Best guess at the repository's main branch.
    ///
    /// Checks `origin`'s remote HEAD first, then common local names.
    pub fn default_branch(&self) -> anyhow::Result<Option<String>> {
        let output =
            self.run_command_output(&["symbolic-ref", "--quiet", "refs/remotes/origin/HEAD"])?;
        if output.status.success()
            && let Some(branch) =
                remote_head_branch("origin", &String::from_utf8_lossy(&output.stdout))
            && self.branch_exists(&branch)?
        {
            return Ok(Some(branch));
        }

        for name in ["main", "master", "develop", "trunk"] {
            if self.branch_exists(name)? {
                return Ok(Some(name.to_string()));
            }
        }
        Ok(None)
    }

    fn logging_context(&self) -> String {
        crate::path::file_name_str(&self.path)
            .unwrap_or(".")
            .to_string()
    }

    fn git_command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args);
        cmd.current_dir(&self.path);
        cmd
    }

    /// Run a git command and return its raw output, whatever the exit status.
    ///
    /// Only fails when git could not be spawned at all.
    pub fn run_command_output(&self, args: &[&str]) -> anyhow::Result<Output> {
        let mut cmd = self.git_command(args);
        shell_exec::run(&mut cmd, Some(&self.logging_context()))
            .with_context(|| format!("Failed to execute: git {}", args.join(" ")))
    }

    /// Run a git command in this repository's context, returning stdout.
    ///
    /// A non-zero exit becomes a [`GitError::EngineError`] carrying git's
    /// stderr (and stdout, since some commands report errors there).
    pub fn run_command(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = self.run_command_output(args)?;

        if !output.status.success() {
            // Git uses \r for progress updates
            let stderr = String::from_utf8_lossy(&output.stderr).replace('\r', "\n");
            for line in stderr.trim().lines() {
                log::debug!("  ! {}", line);
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = [stderr.trim(), stdout.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(GitError::EngineError {
                command: format!("git {}", args.join(" ")),
                message,
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        for line in stdout.trim().lines() {
            log::debug!("  {}", line);
        }
        Ok(stdout)
    }

    /// Run a git command and return whether it exited 0.
    ///
    /// For commands that answer with their exit status, like
    /// `git show-ref --verify --quiet`.
    pub fn run_command_check(&self, args: &[&str]) -> anyhow::Result<bool> {
        Ok(self.run_command_output(args)?.status.success())
    }
}
