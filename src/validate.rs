//! Pre-flight checks before a merge.
//!
//! Every check runs, even after one has failed, so a user sees all blocking
//! problems at once instead of fixing them one invocation at a time. Expected
//! conditions (missing worktree, dirty trees, detached HEAD) come back as
//! [`ValidationIssue`]s; only unexpected git failures are errors.

use std::path::{Path, PathBuf};

use color_print::cformat;

use crate::config::{Config, is_tool_artifact};
use crate::git::{ChangeLocation, GitError, WorktreeRecord};
use crate::locate::Locator;
use crate::styling::suggest_command;
use crate::topology::RepositoryHandle;

/// How many paths an issue lists before summarizing the rest.
const MAX_LISTED_PATHS: usize = 10;

/// Blocking sorts before warning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Blocking,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueKind {
    WorktreeNotFound,
    UncommittedChanges,
    /// Only the tool's own config or state files differ from HEAD.
    ToolConfigChanged,
    DetachedHead,
    MergeInProgress,
    MainBranchMissing,
    UnpushedCommits,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub detail: Option<String>,
    pub worktree_path: Option<PathBuf>,
    /// For `UncommittedChanges`, which checkout is dirty.
    pub location: Option<ChangeLocation>,
    /// How to resolve the issue, ready for display.
    pub hint: Option<String>,
}

impl ValidationIssue {
    fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            detail: None,
            worktree_path: None,
            location: None,
            hint: None,
        }
    }

    fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn at(mut self, path: &Path) -> Self {
        self.worktree_path = Some(path.to_path_buf());
        self
    }

    fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn location(mut self, location: ChangeLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// Downgrade uncommitted changes in the target worktree to a warning.
    pub force: bool,
}

/// Commits on the target branch its upstream hasn't seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpushed {
    pub upstream: String,
    pub count: usize,
}

/// Everything validation learned, so later phases don't ask git again.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Blocking issues first.
    pub issues: Vec<ValidationIssue>,
    pub worktree: Option<WorktreeRecord>,
    pub main_branch: Option<String>,
    pub unpushed: Option<Unpushed>,
}

impl ValidationReport {
    /// Safe to proceed ⇔ no blocking issues.
    pub fn is_safe(&self) -> bool {
        !self.issues.iter().any(ValidationIssue::is_blocking)
    }

    pub fn blocking(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_blocking())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_blocking())
    }
}

/// Runs the pre-merge checks for one repository.
pub struct Validator<'a> {
    handle: &'a RepositoryHandle,
    config: &'a Config,
    cwd: Option<PathBuf>,
}

impl<'a> Validator<'a> {
    pub fn new(handle: &'a RepositoryHandle, config: &'a Config) -> Self {
        Self {
            handle,
            config,
            cwd: None,
        }
    }

    /// Let the locator consider the checkout the caller is standing in.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn validate(
        &self,
        worktree_name: &str,
        options: ValidateOptions,
    ) -> anyhow::Result<ValidationReport> {
        let mut report = ValidationReport::default();

        self.check_worktree_exists(worktree_name, &mut report)?;
        self.check_main_branch(&mut report)?;
        self.check_main_checkout(&mut report)?;
        if let Some(worktree) = report.worktree.clone() {
            self.check_worktree_state(worktree_name, &worktree, options, &mut report)?;
        }

        // Stable: checks keep their order within a severity
        report.issues.sort_by_key(|issue| issue.severity);
        log::debug!(
            "Validation of {worktree_name}: {} issue(s), safe={}",
            report.issues.len(),
            report.is_safe()
        );
        Ok(report)
    }

    fn check_worktree_exists(&self, name: &str, report: &mut ValidationReport) -> anyhow::Result<()> {
        let mut locator = Locator::new(self.handle, self.config);
        if let Some(cwd) = &self.cwd {
            locator = locator.with_cwd(cwd);
        }
        match locator.locate(name) {
            Ok(record) => report.worktree = Some(record),
            Err(err) => match err.downcast_ref::<GitError>() {
                Some(GitError::WorktreeNotFound { .. }) => {
                    report.issues.push(
                        ValidationIssue::new(
                            IssueKind::WorktreeNotFound,
                            Severity::Blocking,
                            format!("No worktree found for {name}"),
                        )
                        .hint(cformat!(
                            "To list worktrees, run <bright-black>git worktree list</>"
                        )),
                    );
                }
                _ => return Err(err),
            },
        }
        Ok(())
    }

    fn check_main_branch(&self, report: &mut ValidationReport) -> anyhow::Result<()> {
        let main = self.handle.main();
        let configured = self.config.main_branch.clone();
        let branch = match configured {
            Some(branch) => Some(branch),
            None => main.default_branch()?,
        };
        match branch {
            Some(branch) if main.branch_exists(&branch)? => report.main_branch = Some(branch),
            Some(branch) => report.issues.push(
                ValidationIssue::new(
                    IssueKind::MainBranchMissing,
                    Severity::Blocking,
                    format!("Main branch {branch} does not exist"),
                )
                .hint("Set main-branch in .wtport.toml to an existing branch"),
            ),
            None => report.issues.push(
                ValidationIssue::new(
                    IssueKind::MainBranchMissing,
                    Severity::Blocking,
                    "Could not determine the main branch",
                )
                .hint("Set main-branch in .wtport.toml"),
            ),
        }
        Ok(())
    }

    fn check_main_checkout(&self, report: &mut ValidationReport) -> anyhow::Result<()> {
        let main = self.handle.main();
        let main_root = self.handle.main_root();

        if main.is_merging()? {
            report.issues.push(
                ValidationIssue::new(
                    IssueKind::MergeInProgress,
                    Severity::Blocking,
                    "The main checkout has a merge in progress",
                )
                .at(main_root)
                .hint(cformat!(
                    "Finish it with <bright-black>git commit</> or abandon it with <bright-black>git merge --abort</>"
                )),
            );
        }

        let status = main.tracked_status()?;
        if status.is_clean() {
            return Ok(());
        }

        let issue = if status.changed_paths.iter().all(|p| is_tool_artifact(p)) {
            ValidationIssue::new(
                IssueKind::ToolConfigChanged,
                Severity::Warning,
                "Only wtport's own configuration differs from HEAD in the main checkout",
            )
            .hint(cformat!(
                "Regenerate wtport's configuration and commit it, or restore the committed copy with <bright-black>git checkout -- .wtport.toml .wtport</>"
            ))
        } else {
            ValidationIssue::new(
                IssueKind::UncommittedChanges,
                Severity::Blocking,
                "The main checkout has uncommitted changes",
            )
            .location(ChangeLocation::Main)
            .hint("Commit or stash your changes first")
        };
        report
            .issues
            .push(issue.detail(list_paths(&status.changed_paths)).at(main_root));
        Ok(())
    }

    fn check_worktree_state(
        &self,
        name: &str,
        worktree: &WorktreeRecord,
        options: ValidateOptions,
        report: &mut ValidationReport,
    ) -> anyhow::Result<()> {
        if !worktree.path.is_dir() {
            report.issues.push(
                ValidationIssue::new(
                    IssueKind::WorktreeNotFound,
                    Severity::Blocking,
                    format!("Worktree directory for {name} is missing"),
                )
                .at(&worktree.path)
                .hint(cformat!(
                    "To drop stale entries, run <bright-black>git worktree prune</>"
                )),
            );
            return Ok(());
        }

        let repo = self.handle.repo_at(&worktree.path);
        let status = repo.status()?;
        if !status.is_clean() {
            let (severity, hint) = if options.force {
                (
                    Severity::Warning,
                    "Uncommitted changes stay in the worktree and are not merged".to_string(),
                )
            } else {
                let cmd = suggest_command("merge", &[name], &["--force"]);
                (
                    Severity::Blocking,
                    cformat!("Commit or stash your changes first, or run <bright-black>{cmd}</>"),
                )
            };
            report.issues.push(
                ValidationIssue::new(
                    IssueKind::UncommittedChanges,
                    severity,
                    format!("Worktree {name} has uncommitted changes"),
                )
                .location(ChangeLocation::Worktree)
                .detail(list_paths(&status.changed_paths))
                .at(&worktree.path)
                .hint(hint),
            );
        }

        let Some(branch) = worktree.branch.as_deref() else {
            report.issues.push(
                ValidationIssue::new(
                    IssueKind::DetachedHead,
                    Severity::Blocking,
                    format!("Worktree {name} is not on a branch (detached HEAD)"),
                )
                .at(&worktree.path)
                .hint(cformat!(
                    "To switch to a branch, run <bright-black>git switch BRANCH</> in the worktree"
                )),
            );
            return Ok(());
        };

        if let Some(upstream) = repo.upstream(branch)? {
            let count = repo.ahead_count(&upstream, branch)?;
            if count > 0 {
                report.issues.push(
                    ValidationIssue::new(
                        IssueKind::UnpushedCommits,
                        Severity::Warning,
                        format!("{branch} has {count} commit(s) not pushed to {upstream}"),
                    )
                    .at(&worktree.path),
                );
                report.unpushed = Some(Unpushed { upstream, count });
            }
        }
        Ok(())
    }
}

fn list_paths(paths: &[String]) -> String {
    let mut listed: Vec<&str> = paths.iter().take(MAX_LISTED_PATHS).map(String::as_str).collect();
    let rest = paths.len().saturating_sub(MAX_LISTED_PATHS);
    let more = format!("... and {rest} more");
    if rest > 0 {
        listed.push(&more);
    }
    listed.join("\n")
}
