//! Find the worktree a user means by name.
//!
//! The registry git keeps can disagree with what's on disk or in the user's
//! head: directories get renamed, layouts change between releases, and the
//! registry can lag behind manual edits. Lookup therefore runs an ordered
//! list of strategies, most specific first, and stops at the first match.

use std::path::{Path, PathBuf};

use crate::config::{Config, LEGACY_DIR_PREFIX};
use crate::git::{GitError, Repository, WorktreeRecord};
use crate::path::{canonicalize_or_normalize, comparison_key, file_name_str, segments_equal};
use crate::topology::{self, RepositoryHandle};

/// One way of matching a name to a worktree, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum MatchStrategy {
    /// The path the naming convention would give `name`.
    ConventionPath,
    /// A registered worktree whose directory is called `name`.
    DirectoryName,
    /// A registered worktree using the old `wt-<name>` directory naming.
    LegacyPrefix,
    /// A registered worktree with `name` checked out.
    BranchName,
    /// The caller is standing in a real checkout the registry doesn't list.
    LiveCheckout,
}

/// Inputs shared by every strategy.
pub struct LocateContext<'a> {
    pub name: &'a str,
    pub handle: &'a RepositoryHandle,
    pub config: &'a Config,
    /// Registered worktrees, excluding the main checkout and bare entries.
    pub candidates: &'a [WorktreeRecord],
    /// The caller's current directory, when known.
    pub cwd: Option<&'a Path>,
}

impl MatchStrategy {
    pub const ORDER: [MatchStrategy; 5] = [
        MatchStrategy::ConventionPath,
        MatchStrategy::DirectoryName,
        MatchStrategy::LegacyPrefix,
        MatchStrategy::BranchName,
        MatchStrategy::LiveCheckout,
    ];

    pub fn try_match(self, ctx: &LocateContext<'_>) -> anyhow::Result<Option<WorktreeRecord>> {
        let found = match self {
            MatchStrategy::ConventionPath => {
                let expected = comparison_key(&canonicalize_or_normalize(
                    &ctx.config.worktree_path(ctx.handle.main_root(), ctx.name),
                ));
                find(ctx, |wt| {
                    comparison_key(&canonicalize_or_normalize(&wt.path)) == expected
                })
            }
            MatchStrategy::DirectoryName => find(ctx, |wt| {
                wt.dir_name().is_some_and(|dir| segments_equal(dir, ctx.name))
            }),
            MatchStrategy::LegacyPrefix => {
                let legacy = format!("{LEGACY_DIR_PREFIX}{}", ctx.name);
                find(ctx, |wt| {
                    wt.dir_name().is_some_and(|dir| segments_equal(dir, &legacy))
                })
            }
            MatchStrategy::BranchName => find(ctx, |wt| wt.branch.as_deref() == Some(ctx.name)),
            MatchStrategy::LiveCheckout => return live_checkout(ctx),
        };
        Ok(found)
    }
}

fn find(
    ctx: &LocateContext<'_>,
    predicate: impl Fn(&WorktreeRecord) -> bool,
) -> Option<WorktreeRecord> {
    ctx.candidates.iter().find(|wt| predicate(wt)).cloned()
}

/// Build a record from the checkout around `cwd` when git's registry has no
/// entry for it but it belongs to this repository and matches the name.
fn live_checkout(ctx: &LocateContext<'_>) -> anyhow::Result<Option<WorktreeRecord>> {
    let Some(cwd) = ctx.cwd else {
        return Ok(None);
    };
    let Ok(topology) = topology::resolve(cwd) else {
        return Ok(None);
    };
    if !topology.is_linked_worktree
        || comparison_key(&topology.main_root) != comparison_key(ctx.handle.main_root())
    {
        return Ok(None);
    }
    let key = comparison_key(&topology.working_path);
    if ctx
        .candidates
        .iter()
        .any(|wt| comparison_key(&canonicalize_or_normalize(&wt.path)) == key)
    {
        // Registered: an earlier strategy would have matched if it were meant
        return Ok(None);
    }

    let repo = Repository::at(&topology.working_path);
    let branch = repo.current_branch()?;
    let dir_matches = file_name_str(&topology.working_path)
        .is_some_and(|dir| segments_equal(dir, ctx.name));
    if !dir_matches && branch.as_deref() != Some(ctx.name) {
        return Ok(None);
    }

    log::debug!(
        "Synthesizing worktree record for unregistered checkout {}",
        topology.working_path.display()
    );
    Ok(Some(WorktreeRecord {
        head: repo.head_commit()?,
        path: topology.working_path,
        branch,
        bare: false,
        locked: None,
        prunable: None,
        registered: false,
    }))
}

/// Worktree lookup bound to one repository.
pub struct Locator<'a> {
    handle: &'a RepositoryHandle,
    config: &'a Config,
    cwd: Option<PathBuf>,
}

impl<'a> Locator<'a> {
    pub fn new(handle: &'a RepositoryHandle, config: &'a Config) -> Self {
        Self {
            handle,
            config,
            cwd: None,
        }
    }

    /// Enable the live-checkout strategy for a caller standing in `cwd`.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Registered worktrees other than the main checkout.
    pub fn candidates(&self) -> anyhow::Result<Vec<WorktreeRecord>> {
        let main_key = comparison_key(self.handle.main_root());
        Ok(self
            .handle
            .main()
            .list_worktrees()?
            .into_iter()
            .filter(|wt| !wt.bare)
            .filter(|wt| comparison_key(&canonicalize_or_normalize(&wt.path)) != main_key)
            .collect())
    }

    /// Run the strategies in order, reporting which one matched.
    pub fn find(&self, name: &str) -> anyhow::Result<Option<(MatchStrategy, WorktreeRecord)>> {
        let candidates = self.candidates()?;
        let ctx = LocateContext {
            name,
            handle: self.handle,
            config: self.config,
            candidates: &candidates,
            cwd: self.cwd.as_deref(),
        };
        for strategy in MatchStrategy::ORDER {
            if let Some(record) = strategy.try_match(&ctx)? {
                log::debug!("Worktree {name} matched by {strategy}");
                return Ok(Some((strategy, record)));
            }
        }
        Ok(None)
    }

    /// Find the worktree called `name`, or fail with [`GitError::WorktreeNotFound`].
    pub fn locate(&self, name: &str) -> anyhow::Result<WorktreeRecord> {
        match self.find(name)? {
            Some((_, record)) => Ok(record),
            None => Err(GitError::WorktreeNotFound {
                name: name.to_string(),
            }
            .into()),
        }
    }
}
