//! Safety snapshots taken before destructive operations.
//!
//! Each snapshot is a directory under `.wtport/backups/<id>/` holding
//! `metadata.json` and, when there were uncommitted tracked changes, a
//! `changes.patch`. The uncommitted state is additionally captured as a
//! dangling stash commit pinned by `refs/wtport-backup/<id>`, so it survives
//! deletion of the on-disk record.
//!
//! Records are written once and never edited. Restoring reads a record;
//! nothing here mutates one in place.

mod state;

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::git::{GitError, Repository, ResetMode};
use crate::topology::RepositoryHandle;
use crate::utils::{compact_timestamp, now};

pub use state::MergeState;

const BACKUPS_DIR: &str = "backups";
const METADATA_FILE: &str = "metadata.json";
const PATCH_FILE: &str = "changes.patch";
const MERGE_STATE_FILE: &str = "merge-state.json";
/// Namespace for refs pinning captured uncommitted changes.
pub const BACKUP_REF_PREFIX: &str = "refs/wtport-backup/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub operation: String,
    pub created_at: DateTime<Utc>,
    /// `None` when HEAD was detached.
    pub branch: Option<String>,
    pub commit: String,
    pub working_directory: PathBuf,
    #[serde(default)]
    pub saved_state: SavedState,
    /// Caller-supplied context (worktree name, target branch, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Best-effort capture of uncommitted changes at snapshot time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    /// Stash-equivalent commit holding tracked modifications.
    pub stash: Option<String>,
    /// Ref keeping `stash` reachable.
    pub stash_ref: Option<String>,
    /// Patch file name inside the snapshot directory.
    pub patch_file: Option<String>,
    /// Tracked paths that differed from HEAD.
    #[serde(default)]
    pub changed_paths: Vec<String>,
}

impl SavedState {
    pub fn is_empty(&self) -> bool {
        self.stash.is_none() && self.patch_file.is_none() && self.changed_paths.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Move back to the captured commit without discarding current
    /// uncommitted changes (fails instead of overwriting them).
    pub keep_changes: bool,
}

/// The backup store of one repository.
pub struct SnapshotStore<'a> {
    repo: &'a Repository,
    tool_dir: PathBuf,
}

impl<'a> SnapshotStore<'a> {
    /// Store for the main checkout of `handle`.
    pub fn new(handle: &'a RepositoryHandle) -> Self {
        Self {
            repo: handle.main(),
            tool_dir: handle.tool_dir(),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.tool_dir.join(BACKUPS_DIR)
    }

    fn merge_state_path(&self) -> PathBuf {
        self.tool_dir.join(MERGE_STATE_FILE)
    }

    /// Capture the current branch, commit and uncommitted changes of the main
    /// checkout before `operation` runs.
    ///
    /// Capturing uncommitted changes is best-effort; failing to write the
    /// record itself is a [`GitError::SnapshotPersistenceFailed`].
    pub fn snapshot(
        &self,
        operation: &str,
        metadata: BTreeMap<String, String>,
    ) -> anyhow::Result<Snapshot> {
        let created_at = now();
        let branch = self.repo.current_branch()?;
        let commit = self.repo.head_commit()?;

        let root = self.root();
        fs::create_dir_all(&root).map_err(|e| persistence_failed(&root, e))?;
        let (id, dir) = self.reserve_dir(created_at, operation)?;

        let saved_state = self.capture_changes(&id, &dir);
        let snapshot = Snapshot {
            id,
            operation: operation.to_string(),
            created_at,
            branch,
            commit,
            working_directory: self.repo.path().to_path_buf(),
            saved_state,
            metadata,
        };

        let json = serde_json::to_string_pretty(&snapshot).context("serializing snapshot")?;
        if let Err(err) = write_atomic(&dir.join(METADATA_FILE), json.as_bytes()) {
            // Leave no half-written record behind
            let _ = fs::remove_dir_all(&dir);
            return Err(err);
        }

        log::info!(
            "Snapshot {} of {} at {} ({})",
            snapshot.id,
            snapshot.branch.as_deref().unwrap_or("detached HEAD"),
            &snapshot.commit[..snapshot.commit.len().min(8)],
            operation
        );
        Ok(snapshot)
    }

    /// Create the snapshot directory, suffixing the id on collision.
    fn reserve_dir(&self, at: DateTime<Utc>, operation: &str) -> anyhow::Result<(String, PathBuf)> {
        let op = sanitize_filename::sanitize(operation).replace(' ', "-");
        let op = if op.is_empty() { "snapshot".to_string() } else { op };
        let base = format!("{}-{op}", compact_timestamp(at));

        let root = self.root();
        for attempt in 1u32.. {
            let id = if attempt == 1 {
                base.clone()
            } else {
                format!("{base}-{attempt}")
            };
            let dir = root.join(&id);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((id, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(persistence_failed(&dir, e)),
            }
        }
        anyhow::bail!("no free snapshot id for {base}")
    }

    fn capture_changes(&self, id: &str, dir: &Path) -> SavedState {
        let mut saved = SavedState::default();

        match self.repo.tracked_status() {
            Ok(status) => saved.changed_paths = status.changed_paths,
            Err(e) => log::warn!("Could not read status for snapshot {id}: {e:#}"),
        }
        if saved.changed_paths.is_empty() {
            return saved;
        }

        match self.repo.stash_create(&format!("wtport snapshot {id}")) {
            Ok(Some(sha)) => {
                let refname = format!("{BACKUP_REF_PREFIX}{id}");
                match self
                    .repo
                    .update_ref(&refname, &sha, &format!("wtport: snapshot {id}"))
                {
                    Ok(()) => saved.stash_ref = Some(refname),
                    Err(e) => log::warn!("Could not pin snapshot changes with {refname}: {e:#}"),
                }
                saved.stash = Some(sha);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Could not capture uncommitted changes for {id}: {e:#}"),
        }

        match self.repo.uncommitted_patch() {
            Ok(patch) if !patch.is_empty() => {
                match write_atomic(&dir.join(PATCH_FILE), patch.as_bytes()) {
                    Ok(()) => saved.patch_file = Some(PATCH_FILE.to_string()),
                    Err(e) => log::warn!("Could not save patch for {id}: {e:#}"),
                }
            }
            Ok(_) => {}
            Err(e) => log::warn!("Could not export patch for {id}: {e:#}"),
        }
        saved
    }

    /// All readable snapshots, oldest first.
    pub fn list(&self) -> anyhow::Result<Vec<Snapshot>> {
        let root = self.root();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", root.display())),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("reading {}", root.display()))?;
            let metadata = entry.path().join(METADATA_FILE);
            if !metadata.is_file() {
                continue;
            }
            match read_snapshot(&metadata) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => log::warn!("Skipping unreadable snapshot {}: {e:#}", metadata.display()),
            }
        }
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(snapshots)
    }

    pub fn get(&self, id: &str) -> anyhow::Result<Snapshot> {
        let dir = self.snapshot_dir(id)?;
        let metadata = dir.join(METADATA_FILE);
        if !metadata.is_file() {
            return Err(GitError::SnapshotNotFound { id: id.to_string() }.into());
        }
        read_snapshot(&metadata)
    }

    /// Return the snapshot's checkout to the captured branch and commit.
    pub fn restore(&self, id: &str, options: RestoreOptions) -> anyhow::Result<Snapshot> {
        let snapshot = self.get(id)?;
        let repo = Repository::at(&snapshot.working_directory);

        if options.keep_changes {
            // Checkout carries local modifications; `--keep` refuses to drop them
            self.move_head(&repo, &snapshot)?;
            repo.reset(ResetMode::Keep, &snapshot.commit)?;
        } else {
            // Also clears an unfinished merge
            repo.reset(ResetMode::Hard, "HEAD")?;
            self.move_head(&repo, &snapshot)?;
            repo.reset(ResetMode::Hard, &snapshot.commit)?;
            if let Some(stash) = &snapshot.saved_state.stash
                && let Err(e) = repo.stash_apply(stash)
            {
                log::warn!("Could not re-apply uncommitted changes from {id}: {e:#}");
            }
        }

        log::info!("Restored snapshot {id}");
        Ok(snapshot)
    }

    fn move_head(&self, repo: &Repository, snapshot: &Snapshot) -> anyhow::Result<()> {
        match &snapshot.branch {
            Some(branch) => repo.checkout(branch),
            None => repo.checkout_detached(&snapshot.commit),
        }
    }

    /// Remove the on-disk record. Commits and the backup ref stay.
    pub fn delete(&self, id: &str) -> anyhow::Result<()> {
        let dir = self.snapshot_dir(id)?;
        if !dir.is_dir() {
            return Err(GitError::SnapshotNotFound { id: id.to_string() }.into());
        }
        fs::remove_dir_all(&dir).with_context(|| format!("removing {}", dir.display()))?;
        log::info!("Deleted snapshot {id}");
        Ok(())
    }

    /// Delete snapshots older than `older_than`, returning the removed ids.
    pub fn prune(&self, older_than: std::time::Duration) -> anyhow::Result<Vec<String>> {
        let max_age =
            chrono::Duration::from_std(older_than).context("prune age out of range")?;
        let cutoff = now() - max_age;
        let mut removed = Vec::new();
        for snapshot in self.list()? {
            if snapshot.created_at < cutoff {
                self.delete(&snapshot.id)?;
                removed.push(snapshot.id);
            }
        }
        Ok(removed)
    }

    /// Record an unresolved merge, replacing any earlier record.
    pub fn save_merge_state(&self, state: &MergeState) -> anyhow::Result<()> {
        fs::create_dir_all(&self.tool_dir).map_err(|e| persistence_failed(&self.tool_dir, e))?;
        let json = serde_json::to_string_pretty(state).context("serializing merge state")?;
        write_atomic(&self.merge_state_path(), json.as_bytes())?;
        log::debug!("Saved merge state for {}", state.branch_name);
        Ok(())
    }

    pub fn load_merge_state(&self) -> anyhow::Result<Option<MergeState>> {
        let path = self.merge_state_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(state))
    }

    /// Returns whether a record existed.
    pub fn clear_merge_state(&self) -> anyhow::Result<bool> {
        let path = self.merge_state_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }

    fn snapshot_dir(&self, id: &str) -> anyhow::Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(GitError::SnapshotNotFound { id: id.to_string() }.into());
        }
        Ok(self.root().join(id))
    }
}

/// Ids are single path segments; anything else can't name a snapshot.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && !id.contains("..")
        && !id.contains(['/', '\\'])
        && !id.starts_with('-')
}

fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn persistence_failed(path: &Path, err: impl std::fmt::Display) -> anyhow::Error {
    GitError::SnapshotPersistenceFailed {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
    .into()
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| persistence_failed(path, e))?;
    file.write_all(contents)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| persistence_failed(path, e))?;
    file.persist(path).map_err(|e| persistence_failed(path, e.error))?;
    Ok(())
}
