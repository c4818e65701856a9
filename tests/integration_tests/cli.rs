//! The `wtp` binary: exit codes and what lands on stdout versus stderr.

use std::fs;
use std::process::Output;

use rstest::rstest;

use crate::common::{TestRepo, conflicting, diverged, repo};

const TEST_EPOCH: &str = "1735689600"; // 2025-01-01T00:00:00Z

fn wtp(repo: &TestRepo, args: &[&str]) -> Output {
    repo.wtp_command()
        .env("WTPORT_TEST_EPOCH", TEST_EPOCH)
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[rstest]
fn test_merge_success_exits_zero(diverged: TestRepo) {
    let output = wtp(&diverged, &["merge", "feature-x"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stderr(&output).contains("Merged feature-x into main"));
    assert!(stderr(&output).contains("backup restore"));
    assert!(diverged.root_path().join("feature.txt").exists());
}

#[rstest]
fn test_merge_conflict_exits_one(conflicting: TestRepo) {
    let output = wtp(&conflicting, &["merge", "feature-x", "--yes"]);

    assert_eq!(output.status.code(), Some(1), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "shared.txt");
    assert!(stderr(&output).contains("conflict"), "{}", stderr(&output));
    assert!(conflicting.root_path().join(".git/MERGE_HEAD").exists());
}

#[rstest]
fn test_merge_state_after_conflict(conflicting: TestRepo) {
    wtp(&conflicting, &["merge", "feature-x", "--yes"]);

    let output = wtp(&conflicting, &["backup", "state"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    insta::assert_snapshot!(stdout(&output), @r"
    worktree:    feature-x
    branch:      feature-x
    main-branch: main
    conflicted:  true
    timestamp:   2025-01-01T00:00:00+00:00
    snapshot:    20250101-000000-000-merge
    conflict:    shared.txt
    ");

    let cleared = wtp(&conflicting, &["backup", "state", "--clear"]);
    assert_eq!(cleared.status.code(), Some(0));
    assert!(stderr(&cleared).contains("Cleared merge state"));

    let after = wtp(&conflicting, &["backup", "state"]);
    assert_eq!(stdout(&after), "");
    assert!(stderr(&after).contains("No merge state recorded"));
}

#[rstest]
fn test_predicted_conflicts_declined_without_terminal(conflicting: TestRepo) {
    let main_before = conflicting.head_sha();
    let output = wtp(&conflicting, &["merge", "feature-x"]);

    assert_eq!(output.status.code(), Some(2), "{}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("Not a terminal"), "{err}");
    assert!(err.contains("Merge cancelled"), "{err}");
    assert!(stdout(&output).contains("shared.txt"));
    assert_eq!(conflicting.head_sha(), main_before);
}

#[rstest]
fn test_validation_failure_exits_two(mut repo: TestRepo) {
    repo.commit_file("src/a.js", "1\n", "Add a.js");
    repo.add_worktree("feature-x");
    repo.write_file(repo.root_path(), "src/a.js", "2\n");

    let output = wtp(&repo, &["merge", "feature-x"]);

    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(err.contains("main checkout has uncommitted changes"), "{err}");
    assert!(err.contains("src/a.js"), "{err}");
    assert!(err.contains("Commit or stash your changes first"), "{err}");
    assert!(err.contains("Merge not attempted"), "{err}");
}

#[rstest]
fn test_check_exit_codes(conflicting: TestRepo) {
    let output = wtp(&conflicting, &["merge", "feature-x", "--check"]);
    assert_eq!(output.status.code(), Some(1), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("shared.txt") && out.contains("[high]"), "{out}");
    assert!(!conflicting.root_path().join(".wtport").exists());
}

#[rstest]
fn test_check_clean_exits_zero(diverged: TestRepo) {
    let output = wtp(&diverged, &["merge", "feature-x", "--check"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stderr(&output).contains("No conflicts predicted"));
    assert_eq!(stdout(&output), "");
}

#[rstest]
fn test_check_and_force_conflict(diverged: TestRepo) {
    let output = wtp(&diverged, &["merge", "feature-x", "--check", "--force"]);
    assert_eq!(output.status.code(), Some(2));
}

#[rstest]
fn test_outside_repository_exits_two(repo: TestRepo) {
    let plain = repo.temp_path().join("plain");
    fs::create_dir_all(&plain).unwrap();

    let output = wtp(&repo, &["-C", plain.to_str().unwrap(), "merge", "anything"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("is not inside a git repository"), "{}", stderr(&output));
}

#[rstest]
fn test_merge_from_inside_worktree_infers_name(diverged: TestRepo) {
    let wt = diverged.worktree_path("feature-x").to_path_buf();
    let output = wtp(&diverged, &["-C", wt.to_str().unwrap(), "merge"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stderr(&output).contains("Merged feature-x into main"));
}

#[rstest]
fn test_user_config_enables_cleanup(diverged: TestRepo) {
    fs::write(diverged.test_config_path(), "auto-cleanup = true\n").unwrap();
    diverged.write_ports(r#"{"worktrees": {"feature-x": [3001]}}"#);

    let output = wtp(&diverged, &["merge", "feature-x", "--yes"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stderr(&output).contains("Removed worktree and branch feature-x"));
    assert!(!diverged.branch_exists("feature-x"));

    let ports = wtp(&diverged, &["ports"]);
    assert_eq!(stdout(&ports), "");
    assert!(stderr(&ports).contains("No ports reserved"));
}

#[rstest]
fn test_backup_list_and_delete(diverged: TestRepo) {
    let empty = wtp(&diverged, &["backup", "list"]);
    assert_eq!(empty.status.code(), Some(0));
    assert!(stderr(&empty).contains("No backups"));

    wtp(&diverged, &["merge", "feature-x"]);

    let listed = wtp(&diverged, &["backup", "list"]);
    let out = stdout(&listed);
    assert!(out.contains("20250101-000000-000-merge"), "{out}");
    assert!(out.contains("merge main@"), "{out}");

    let deleted = wtp(&diverged, &["backup", "delete", "20250101-000000-000-merge"]);
    assert_eq!(deleted.status.code(), Some(0), "{}", stderr(&deleted));

    let missing = wtp(&diverged, &["backup", "delete", "20250101-000000-000-merge"]);
    assert_eq!(missing.status.code(), Some(2));
}

#[rstest]
fn test_backup_restore_undoes_merge(diverged: TestRepo) {
    let main_before = diverged.head_sha();
    wtp(&diverged, &["merge", "feature-x"]);
    assert_ne!(diverged.head_sha(), main_before);

    let output = wtp(&diverged, &["backup", "restore", "20250101-000000-000-merge"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(diverged.head_sha(), main_before);
}

#[rstest]
fn test_ports_lists_reservations(repo: TestRepo) {
    repo.write_ports(r#"{"worktrees": {"api": [3001, 3002], "web": [4000]}}"#);

    let output = wtp(&repo, &["ports"]);

    assert_eq!(output.status.code(), Some(0));
    insta::assert_snapshot!(stdout(&output), @r"
    api  3001, 3002
    web  4000
    ");
}
