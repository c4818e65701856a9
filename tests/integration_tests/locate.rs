use std::fs;

use rstest::rstest;
use wtport::config::Config;
use wtport::git::GitError;
use wtport::locate::{Locator, MatchStrategy};

use crate::common::{TestRepo, canonicalize, repo};

#[rstest]
fn test_locate_by_convention_path(mut repo: TestRepo) {
    let wt = repo.add_worktree("feature-x");
    let handle = repo.handle();
    let config = Config::default();

    let (strategy, record) = Locator::new(&handle, &config)
        .find("feature-x")
        .unwrap()
        .unwrap();
    assert_eq!(strategy, MatchStrategy::ConventionPath);
    assert_eq!(canonicalize(&record.path).unwrap(), wt);
    assert_eq!(record.branch.as_deref(), Some("feature-x"));
    assert!(record.registered);
}

#[rstest]
fn test_locate_by_directory_name(mut repo: TestRepo) {
    let path = repo.temp_path().join("trees/feature-x");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let wt = repo.add_worktree_at("feature-x", &path, "topic");
    let handle = repo.handle();
    let config = Config::default();

    let (strategy, record) = Locator::new(&handle, &config)
        .find("feature-x")
        .unwrap()
        .unwrap();
    assert_eq!(strategy, MatchStrategy::DirectoryName);
    assert_eq!(canonicalize(&record.path).unwrap(), wt);
    assert_eq!(record.branch.as_deref(), Some("topic"));
}

#[rstest]
fn test_locate_by_legacy_prefix(mut repo: TestRepo) {
    let path = repo.root_path().join(".worktrees/wt-feature-x");
    repo.add_worktree_at("legacy", &path, "legacy-branch");
    let handle = repo.handle();
    let config = Config::default();

    let (strategy, record) = Locator::new(&handle, &config)
        .find("feature-x")
        .unwrap()
        .unwrap();
    assert_eq!(strategy, MatchStrategy::LegacyPrefix);
    assert_eq!(record.branch.as_deref(), Some("legacy-branch"));
}

#[rstest]
fn test_locate_by_branch_name(mut repo: TestRepo) {
    let path = repo.root_path().join(".worktrees/some-dir");
    repo.add_worktree_at("some-dir", &path, "feature-y");
    let handle = repo.handle();
    let config = Config::default();

    let (strategy, record) = Locator::new(&handle, &config)
        .find("feature-y")
        .unwrap()
        .unwrap();
    assert_eq!(strategy, MatchStrategy::BranchName);
    assert_eq!(record.dir_name(), Some("some-dir"));
}

#[rstest]
fn test_convention_wins_over_directory_name(mut repo: TestRepo) {
    // Same directory name in two places; the convention path is preferred
    let elsewhere = repo.temp_path().join("other/feature-x");
    fs::create_dir_all(elsewhere.parent().unwrap()).unwrap();
    repo.add_worktree_at("other", &elsewhere, "other-branch");
    let conventional = repo.add_worktree("feature-x");
    let handle = repo.handle();
    let config = Config::default();

    let record = Locator::new(&handle, &config).locate("feature-x").unwrap();
    assert_eq!(canonicalize(&record.path).unwrap(), conventional);
}

#[rstest]
fn test_locate_respects_base_dir(mut repo: TestRepo) {
    let path = repo.temp_path().join("custom/feature-x");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    repo.add_worktree_at("feature-x", &path, "feature-x");
    let handle = repo.handle();
    let config = Config {
        base_dir: "../custom".to_string(),
        ..Config::default()
    };

    let (strategy, _) = Locator::new(&handle, &config)
        .find("feature-x")
        .unwrap()
        .unwrap();
    assert_eq!(strategy, MatchStrategy::ConventionPath);
}

#[rstest]
fn test_locate_moved_checkout_from_inside(mut repo: TestRepo) {
    let wt = repo.add_worktree("old-name");
    let moved = repo.temp_path().join("renamed");
    fs::rename(&wt, &moved).unwrap();
    let handle = repo.handle();
    let config = Config::default();

    // Without a cwd nothing in the registry matches the new name
    assert!(Locator::new(&handle, &config).find("renamed").unwrap().is_none());

    let (strategy, record) = Locator::new(&handle, &config)
        .with_cwd(&moved)
        .find("renamed")
        .unwrap()
        .unwrap();
    assert_eq!(strategy, MatchStrategy::LiveCheckout);
    assert!(!record.registered);
    assert_eq!(record.branch.as_deref(), Some("old-name"));
    assert_eq!(record.path, canonicalize(&moved).unwrap());
}

#[rstest]
fn test_locate_is_idempotent(mut repo: TestRepo) {
    repo.add_worktree("feature-x");
    let handle = repo.handle();
    let config = Config::default();
    let locator = Locator::new(&handle, &config);

    let first = locator.locate("feature-x").unwrap();
    let second = locator.locate("feature-x").unwrap();
    assert_eq!(first, second);
}

#[rstest]
fn test_locate_not_found(mut repo: TestRepo) {
    repo.add_worktree("feature-x");
    let handle = repo.handle();
    let config = Config::default();

    let err = Locator::new(&handle, &config).locate("nope").unwrap_err();
    match err.downcast_ref::<GitError>() {
        Some(GitError::WorktreeNotFound { name }) => assert_eq!(name, "nope"),
        other => panic!("expected WorktreeNotFound, got {other:?}"),
    }
}

#[rstest]
fn test_main_checkout_is_never_a_candidate(repo: TestRepo) {
    let handle = repo.handle();
    let config = Config::default();

    // `main` is checked out in the main checkout only
    assert!(Locator::new(&handle, &config).find("main").unwrap().is_none());
    assert!(Locator::new(&handle, &config).candidates().unwrap().is_empty());
}
