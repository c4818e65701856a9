//! Repository topology: which checkout are we in, and where is the main one?
//!
//! Resolution is pure filesystem probing. Starting from any directory we walk
//! upward until a `.git` entry appears:
//!
//! - a `.git` **directory** marks a main checkout;
//! - a `.git` **file** holds a `gitdir: <path>` pointer to the worktree's
//!   private metadata, whose `commondir` file points at the shared store.
//!   The main checkout is the shared store's parent.
//!
//! Pointers may be relative, may contain `..`, and may name directories that
//! no longer exist (a worktree whose metadata was pruned). The last case is
//! handled by reading the conventional `.git/worktrees/<name>` layout off the
//! pointer itself.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TOOL_DIR;
use crate::git::{GitError, Repository};
use crate::path::{canonicalize_or_normalize, file_name_str, resolve_relative};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RepositoryTopology {
    /// Top of the checkout containing the start directory.
    pub working_path: PathBuf,
    /// Where this checkout's metadata really lives.
    pub git_metadata_path: PathBuf,
    pub is_linked_worktree: bool,
    /// Working path of the main checkout. Never a linked worktree.
    pub main_root: PathBuf,
}

/// Resolve the topology of the checkout containing `start_dir`.
pub fn resolve(start_dir: &Path) -> Result<RepositoryTopology, GitError> {
    let start = canonicalize_or_normalize(start_dir);

    for dir in start.ancestors() {
        let candidate = dir.join(".git");
        if candidate.is_dir() {
            log::debug!("Main checkout at {}", dir.display());
            return Ok(RepositoryTopology {
                working_path: dir.to_path_buf(),
                git_metadata_path: candidate,
                is_linked_worktree: false,
                main_root: dir.to_path_buf(),
            });
        }
        if candidate.is_file() {
            return resolve_descriptor(dir, &candidate);
        }
    }

    Err(GitError::NotARepository {
        path: start,
        detail: None,
    })
}

fn resolve_descriptor(dir: &Path, descriptor: &Path) -> Result<RepositoryTopology, GitError> {
    let not_a_repo = |detail: String| GitError::NotARepository {
        path: dir.to_path_buf(),
        detail: Some(detail),
    };

    let contents = fs::read_to_string(descriptor)
        .map_err(|e| not_a_repo(format!("cannot read {}: {e}", descriptor.display())))?;
    let pointer = parse_gitdir_pointer(&contents)
        .ok_or_else(|| not_a_repo(format!("{} has no gitdir line", descriptor.display())))?;
    let metadata = canonicalize_or_normalize(&resolve_relative(dir, Path::new(pointer)));

    if !metadata.is_dir() {
        // Stale pointer: infer the shared store from `<store>/worktrees/<name>`
        let store = metadata
            .parent()
            .filter(|p| file_name_str(p) == Some("worktrees"))
            .and_then(Path::parent)
            .ok_or_else(|| not_a_repo(format!("gitdir {} does not exist", metadata.display())))?;
        log::debug!(
            "Stale worktree pointer {}; inferring store {}",
            metadata.display(),
            store.display()
        );
        return Ok(RepositoryTopology {
            working_path: dir.to_path_buf(),
            main_root: main_root_for_store(&canonicalize_or_normalize(store)),
            git_metadata_path: metadata,
            is_linked_worktree: true,
        });
    }

    let commondir_file = metadata.join("commondir");
    match fs::read_to_string(&commondir_file) {
        Ok(contents) => {
            let store =
                canonicalize_or_normalize(&resolve_relative(&metadata, Path::new(contents.trim())));
            log::debug!(
                "Linked worktree at {} (store {})",
                dir.display(),
                store.display()
            );
            Ok(RepositoryTopology {
                working_path: dir.to_path_buf(),
                git_metadata_path: metadata,
                is_linked_worktree: true,
                main_root: main_root_for_store(&store),
            })
        }
        // A complete repository stored elsewhere (submodule, --separate-git-dir):
        // the checkout owning the pointer is its own main checkout.
        Err(_) => Ok(RepositoryTopology {
            working_path: dir.to_path_buf(),
            git_metadata_path: metadata,
            is_linked_worktree: false,
            main_root: dir.to_path_buf(),
        }),
    }
}

fn parse_gitdir_pointer(contents: &str) -> Option<&str> {
    contents
        .lines()
        .find_map(|line| line.trim().strip_prefix("gitdir:"))
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

/// The main checkout owning a shared metadata store.
///
/// For the usual `<root>/.git` store that's `<root>`; a store with any other
/// name (a bare repository acting as the hub) is its own root.
fn main_root_for_store(store: &Path) -> PathBuf {
    match (file_name_str(store), store.parent()) {
        (Some(".git"), Some(parent)) => parent.to_path_buf(),
        _ => store.to_path_buf(),
    }
}

/// Resolved topology plus a git handle for the main checkout.
///
/// Produced once per invocation and passed to every component, so root
/// resolution happens in exactly one place.
#[derive(Debug)]
pub struct RepositoryHandle {
    topology: RepositoryTopology,
    main: Repository,
}

impl RepositoryHandle {
    pub fn resolve(start_dir: &Path) -> Result<Self, GitError> {
        resolve(start_dir).map(Self::from_topology)
    }

    pub fn from_topology(topology: RepositoryTopology) -> Self {
        let main = Repository::at(&topology.main_root);
        Self { topology, main }
    }

    pub fn topology(&self) -> &RepositoryTopology {
        &self.topology
    }

    pub fn main_root(&self) -> &Path {
        &self.topology.main_root
    }

    /// Git access for the main checkout.
    pub fn main(&self) -> &Repository {
        &self.main
    }

    /// Git access for another checkout of the same repository.
    pub fn repo_at(&self, path: &Path) -> Repository {
        Repository::at(path)
    }

    /// Directory holding the tool's own state (backups, merge state, ports).
    pub fn tool_dir(&self) -> PathBuf {
        self.main_root().join(TOOL_DIR)
    }
}
