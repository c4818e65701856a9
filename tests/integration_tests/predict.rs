use rstest::rstest;
use wtport::predict::{Risk, predict};

use crate::common::{TestRepo, conflicting, diverged, repo};

#[rstest]
fn test_disjoint_files_predict_nothing(diverged: TestRepo) {
    let handle = diverged.handle();
    let predictions = predict(handle.main(), "feature-x", "main").unwrap();
    assert!(predictions.is_empty(), "{predictions:?}");
}

#[rstest]
fn test_single_line_overlap_is_high_risk(conflicting: TestRepo) {
    let handle = conflicting.handle();
    let predictions = predict(handle.main(), "feature-x", "main").unwrap();

    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].file, "shared.txt");
    assert_eq!(predictions[0].risk, Risk::High);
    assert_eq!(predictions[0].reason, "both branches modified line 2");
}

#[rstest]
fn test_every_shared_file_is_listed_in_path_order(mut repo: TestRepo) {
    let base: String = (1..=30).map(|i| format!("line {i}\n")).collect();
    repo.commit_file("b.txt", &base, "Add b");
    repo.commit_file("a.txt", &base, "Add a");
    repo.commit_file("c.txt", &base, "Add c");
    let wt = repo.add_worktree("feature-x");

    // a.txt: same line; b.txt: far apart; c.txt: only the branch
    let edit = |line: usize, with: &str| base.replacen(&format!("line {line}\n"), with, 1);
    repo.commit_file_in(&wt, "a.txt", &edit(5, "feature five\n"), "Feature a");
    repo.commit_file_in(&wt, "b.txt", &edit(2, "feature two\n"), "Feature b");
    repo.commit_file_in(&wt, "c.txt", &edit(9, "feature nine\n"), "Feature c");
    repo.commit_file("a.txt", &edit(5, "main five\n"), "Main a");
    repo.commit_file("b.txt", &edit(28, "main twenty-eight\n"), "Main b");

    let handle = repo.handle();
    let predictions = predict(handle.main(), "feature-x", "main").unwrap();

    let summary: Vec<_> = predictions
        .iter()
        .map(|p| (p.file.as_str(), p.risk))
        .collect();
    assert_eq!(summary, vec![("a.txt", Risk::High), ("b.txt", Risk::Low)]);
    assert_eq!(predictions[1].reason, "both branches modified separate regions");
}

#[rstest]
fn test_nearby_edits_are_medium_risk(mut repo: TestRepo) {
    let base: String = (1..=20).map(|i| format!("line {i}\n")).collect();
    repo.commit_file("near.txt", &base, "Add near");
    let wt = repo.add_worktree("feature-x");
    repo.commit_file_in(
        &wt,
        "near.txt",
        &base.replacen("line 10\n", "feature ten\n", 1),
        "Feature",
    );
    repo.commit_file(
        "near.txt",
        &base.replacen("line 12\n", "main twelve\n", 1),
        "Main",
    );

    let handle = repo.handle();
    let predictions = predict(handle.main(), "feature-x", "main").unwrap();

    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].risk, Risk::Medium);
    assert!(predictions[0].reason.starts_with("nearby changes 1 line apart"));
}

#[rstest]
fn test_delete_versus_modify_is_high_risk(mut repo: TestRepo) {
    repo.commit_file("doomed.txt", "keep me\n", "Add doomed");
    let wt = repo.add_worktree("feature-x");
    repo.run_git_in(&wt, &["rm", "-q", "doomed.txt"]);
    repo.run_git_in(&wt, &["commit", "-q", "-m", "Remove doomed"]);
    repo.commit_file("doomed.txt", "changed on main\n", "Edit doomed");

    let handle = repo.handle();
    let predictions = predict(handle.main(), "feature-x", "main").unwrap();

    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].risk, Risk::High);
    assert_eq!(predictions[0].reason, "deleted on the branch, modified on main");
}

#[rstest]
fn test_identical_changes_are_low_risk(mut repo: TestRepo) {
    repo.commit_file("same.txt", "old\n", "Add same");
    let wt = repo.add_worktree("feature-x");
    repo.commit_file_in(&wt, "same.txt", "new\n", "Feature");
    repo.commit_file("same.txt", "new\n", "Main");

    let handle = repo.handle();
    let predictions = predict(handle.main(), "feature-x", "main").unwrap();

    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].risk, Risk::Low);
    assert_eq!(predictions[0].reason, "identical changes on both branches");
}

#[rstest]
fn test_prediction_leaves_repository_untouched(conflicting: TestRepo) {
    let main_head = conflicting.head_sha();
    let wt = conflicting.worktree_path("feature-x").to_path_buf();
    let feature_head = conflicting.head_sha_in(&wt);

    let handle = conflicting.handle();
    predict(handle.main(), "feature-x", "main").unwrap();

    assert_eq!(conflicting.head_sha(), main_head);
    assert_eq!(conflicting.head_sha_in(&wt), feature_head);
    assert_eq!(conflicting.current_branch(), "main");
    assert_eq!(conflicting.git_output(&["status", "--porcelain", "--untracked-files=no"]), "");
    assert!(!conflicting.root_path().join(".git/MERGE_HEAD").exists());
}
