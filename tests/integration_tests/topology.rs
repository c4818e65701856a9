use std::fs;

use rstest::rstest;
use wtport::git::GitError;
use wtport::topology::{self, RepositoryHandle};

use crate::common::{TestRepo, canonicalize, repo};

#[rstest]
fn test_main_root_same_from_nested_dirs(repo: TestRepo) {
    let nested = repo.root_path().join("src/deeply/nested");
    fs::create_dir_all(&nested).unwrap();

    for dir in [
        repo.root_path().to_path_buf(),
        repo.root_path().join("src"),
        nested,
    ] {
        let topology = topology::resolve(&dir).unwrap();
        assert_eq!(topology.main_root, repo.root_path(), "from {}", dir.display());
        assert_eq!(topology.working_path, repo.root_path());
        assert!(!topology.is_linked_worktree);
    }
}

#[rstest]
fn test_linked_worktree_resolves_to_main_root(mut repo: TestRepo) {
    let wt = repo.add_worktree("feature-x");
    let nested = wt.join("lib");
    fs::create_dir_all(&nested).unwrap();

    for dir in [&wt, &nested] {
        let topology = topology::resolve(dir).unwrap();
        assert!(topology.is_linked_worktree);
        assert_eq!(topology.main_root, repo.root_path());
        assert_eq!(topology.working_path, wt);
    }

    let from_main = topology::resolve(repo.root_path()).unwrap();
    let from_wt = topology::resolve(&wt).unwrap();
    assert_eq!(from_main.main_root, from_wt.main_root);
}

#[rstest]
fn test_worktree_outside_main_root(mut repo: TestRepo) {
    let outside = repo.temp_path().join("elsewhere");
    let wt = repo.add_worktree_at("elsewhere", &outside, "elsewhere");

    let topology = topology::resolve(&wt).unwrap();
    assert!(topology.is_linked_worktree);
    assert_eq!(topology.main_root, repo.root_path());
}

#[rstest]
fn test_relative_gitdir_pointer(mut repo: TestRepo) {
    let wt = repo.add_worktree("feature-x");
    // Rewrite the absolute pointer git wrote as a relative one
    fs::write(wt.join(".git"), "gitdir: ../../.git/worktrees/feature-x\n").unwrap();

    let topology = topology::resolve(&wt).unwrap();
    assert!(topology.is_linked_worktree);
    assert_eq!(topology.main_root, repo.root_path());
}

#[rstest]
fn test_stale_worktree_pointer(mut repo: TestRepo) {
    let wt = repo.add_worktree("feature-x");
    fs::remove_dir_all(repo.root_path().join(".git/worktrees/feature-x")).unwrap();

    let topology = topology::resolve(&wt).unwrap();
    assert!(topology.is_linked_worktree);
    assert_eq!(topology.main_root, repo.root_path());
}

#[rstest]
fn test_not_a_repository(repo: TestRepo) {
    let outside = repo.temp_path().join("plain");
    fs::create_dir_all(&outside).unwrap();

    let err = topology::resolve(&outside).unwrap_err();
    assert!(matches!(err, GitError::NotARepository { .. }), "{err:?}");
}

#[rstest]
fn test_handle_from_worktree_targets_main(mut repo: TestRepo) {
    let wt = repo.add_worktree("feature-x");
    let handle = RepositoryHandle::resolve(&wt).unwrap();

    assert_eq!(handle.main_root(), repo.root_path());
    assert_eq!(handle.tool_dir(), repo.root_path().join(".wtport"));
    assert_eq!(
        handle.main().current_branch().unwrap().as_deref(),
        Some("main")
    );
    assert_eq!(canonicalize(handle.main().path()).unwrap(), repo.root_path());
}
