use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use rstest::rstest;
use wtport::backup::{BACKUP_REF_PREFIX, MergeState, RestoreOptions, SnapshotStore};
use wtport::git::GitError;
use wtport::utils::now;

use crate::common::{TestRepo, repo};

fn metadata(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[rstest]
#[case::merge("merge", &[("worktree", "feature-x")])]
#[case::no_metadata("cleanup", &[])]
#[case::odd_operation("rebase onto/main", &[("note", "slash in name")])]
fn test_restore_returns_to_captured_state(
    repo: TestRepo,
    #[case] operation: &str,
    #[case] meta: &[(&str, &str)],
) {
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let captured = repo.head_sha();

    let snapshot = store.snapshot(operation, metadata(meta)).unwrap();
    assert_eq!(snapshot.operation, operation);
    assert_eq!(snapshot.branch.as_deref(), Some("main"));
    assert_eq!(snapshot.commit, captured);
    assert_eq!(snapshot.working_directory, repo.root_path());
    assert_eq!(snapshot.metadata, metadata(meta));
    assert!(snapshot.saved_state.is_empty());

    // Move away: new commits on another branch
    repo.run_git(&["checkout", "-q", "-b", "elsewhere"]);
    repo.commit_file("later.txt", "later\n", "Later work");

    let restored = store
        .restore(&snapshot.id, RestoreOptions { keep_changes: false })
        .unwrap();
    assert_eq!(restored, snapshot);
    assert_eq!(repo.current_branch(), "main");
    assert_eq!(repo.head_sha(), captured);
}

#[rstest]
fn test_restore_rewinds_branch(repo: TestRepo) {
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let before = repo.head_sha();
    let snapshot = store.snapshot("merge", BTreeMap::new()).unwrap();

    repo.commit_file("after.txt", "after\n", "After snapshot");
    assert_ne!(repo.head_sha(), before);

    store
        .restore(&snapshot.id, RestoreOptions::default())
        .unwrap();
    assert_eq!(repo.head_sha(), before);
    assert!(!repo.root_path().join("after.txt").exists());
}

#[rstest]
fn test_snapshot_saves_uncommitted_changes(repo: TestRepo) {
    repo.commit_file("notes.txt", "original\n", "Add notes");
    repo.write_file(repo.root_path(), "notes.txt", "edited\n");

    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let snapshot = store.snapshot("merge", BTreeMap::new()).unwrap();

    let saved = &snapshot.saved_state;
    assert_eq!(saved.changed_paths, vec!["notes.txt".to_string()]);
    let stash = saved.stash.clone().unwrap();
    let stash_ref = saved.stash_ref.clone().unwrap();
    assert_eq!(stash_ref, format!("{BACKUP_REF_PREFIX}{}", snapshot.id));
    assert_eq!(repo.git_output(&["rev-parse", &stash_ref]), stash);

    let patch = fs::read_to_string(
        store
            .root()
            .join(&snapshot.id)
            .join(saved.patch_file.as_deref().unwrap()),
    )
    .unwrap();
    assert!(patch.contains("+edited"), "{patch}");

    // Capturing leaves the working tree alone
    assert_eq!(
        fs::read_to_string(repo.root_path().join("notes.txt")).unwrap(),
        "edited\n"
    );
}

#[rstest]
fn test_restore_reapplies_saved_changes(repo: TestRepo) {
    repo.commit_file("notes.txt", "original\n", "Add notes");
    repo.write_file(repo.root_path(), "notes.txt", "edited\n");
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let snapshot = store.snapshot("merge", BTreeMap::new()).unwrap();

    repo.run_git(&["checkout", "-q", "--", "notes.txt"]);
    repo.commit_file("other.txt", "other\n", "Other");

    store
        .restore(&snapshot.id, RestoreOptions::default())
        .unwrap();
    assert_eq!(repo.head_sha(), snapshot.commit);
    assert_eq!(
        fs::read_to_string(repo.root_path().join("notes.txt")).unwrap(),
        "edited\n"
    );
}

#[rstest]
fn test_restore_keep_changes_preserves_working_tree(repo: TestRepo) {
    repo.commit_file("notes.txt", "original\n", "Add notes");
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let snapshot = store.snapshot("merge", BTreeMap::new()).unwrap();

    repo.commit_file("later.txt", "later\n", "Later");
    repo.write_file(repo.root_path(), "notes.txt", "current edit\n");

    store
        .restore(&snapshot.id, RestoreOptions { keep_changes: true })
        .unwrap();
    assert_eq!(repo.head_sha(), snapshot.commit);
    assert_eq!(
        fs::read_to_string(repo.root_path().join("notes.txt")).unwrap(),
        "current edit\n"
    );
    assert!(!repo.root_path().join("later.txt").exists());
}

#[rstest]
fn test_restore_clears_conflicted_merge(mut repo: TestRepo) {
    repo.commit_file("shared.txt", "base\n", "Add shared");
    let wt = repo.add_worktree("feature-x");
    repo.commit_file_in(&wt, "shared.txt", "feature\n", "Feature");
    repo.commit_file("shared.txt", "main\n", "Main");
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let snapshot = store.snapshot("merge", BTreeMap::new()).unwrap();

    repo.run_git_failing_in(repo.root_path(), &["merge", "--no-edit", "feature-x"]);
    assert!(repo.root_path().join(".git/MERGE_HEAD").exists());

    store
        .restore(&snapshot.id, RestoreOptions::default())
        .unwrap();
    assert!(!repo.root_path().join(".git/MERGE_HEAD").exists());
    assert_eq!(repo.head_sha(), snapshot.commit);
    assert_eq!(
        fs::read_to_string(repo.root_path().join("shared.txt")).unwrap(),
        "main\n"
    );
}

#[rstest]
fn test_list_get_and_unique_ids(repo: TestRepo) {
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    assert!(store.list().unwrap().is_empty());

    let first = store.snapshot("merge", BTreeMap::new()).unwrap();
    let second = store.snapshot("merge", BTreeMap::new()).unwrap();
    assert_ne!(first.id, second.id);

    let ids: Vec<_> = store.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![first.id.clone(), second.id.clone()]);
    assert_eq!(store.get(&first.id).unwrap(), first);
}

#[rstest]
fn test_list_skips_unreadable_records(repo: TestRepo) {
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let good = store.snapshot("merge", BTreeMap::new()).unwrap();

    let broken = store.root().join("20200101-000000-000-broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("metadata.json"), "{ not json").unwrap();
    fs::create_dir_all(store.root().join("empty-dir")).unwrap();

    let ids: Vec<_> = store.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![good.id]);
}

#[rstest]
fn test_delete_keeps_commits_and_ref(repo: TestRepo) {
    repo.commit_file("notes.txt", "original\n", "Add notes");
    repo.write_file(repo.root_path(), "notes.txt", "edited\n");
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let snapshot = store.snapshot("merge", BTreeMap::new()).unwrap();
    let stash_ref = snapshot.saved_state.stash_ref.clone().unwrap();

    store.delete(&snapshot.id).unwrap();

    assert!(!store.root().join(&snapshot.id).exists());
    assert!(store.list().unwrap().is_empty());
    assert_eq!(
        repo.git_output(&["rev-parse", &stash_ref]),
        snapshot.saved_state.stash.unwrap()
    );
    assert_eq!(
        repo.git_output(&["cat-file", "-t", &snapshot.commit]),
        "commit"
    );
}

#[rstest]
#[case::missing("20990101-000000-000-merge")]
#[case::traversal("../../etc")]
#[case::empty("")]
fn test_unknown_snapshot_ids(repo: TestRepo, #[case] id: &str) {
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);

    for err in [
        store.get(id).unwrap_err(),
        store.restore(id, RestoreOptions::default()).unwrap_err(),
        store.delete(id).unwrap_err(),
    ] {
        assert!(
            matches!(
                err.downcast_ref::<GitError>(),
                Some(GitError::SnapshotNotFound { .. })
            ),
            "{err:#}"
        );
    }
}

#[rstest]
fn test_unwritable_store_fails_snapshot(repo: TestRepo) {
    let tool_dir = repo.root_path().join(".wtport");
    fs::create_dir_all(&tool_dir).unwrap();
    fs::write(tool_dir.join("backups"), "not a directory").unwrap();

    let handle = repo.handle();
    let err = SnapshotStore::new(&handle)
        .snapshot("merge", BTreeMap::new())
        .unwrap_err();
    assert!(
        matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::SnapshotPersistenceFailed { .. })
        ),
        "{err:#}"
    );
}

#[rstest]
fn test_prune_removes_only_old_snapshots(repo: TestRepo) {
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    let old = store.snapshot("merge", BTreeMap::new()).unwrap();
    let fresh = store.snapshot("merge", BTreeMap::new()).unwrap();

    // Backdate the first record
    let path = store.root().join(&old.id).join("metadata.json");
    let mut record: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    record["created_at"] = serde_json::json!("2020-01-01T00:00:00Z");
    fs::write(&path, serde_json::to_string_pretty(&record).unwrap()).unwrap();

    let removed = store.prune(Duration::from_secs(30 * 86_400)).unwrap();
    assert_eq!(removed, vec![old.id]);

    let remaining: Vec<_> = store.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(remaining, vec![fresh.id]);
}

#[rstest]
fn test_merge_state_lifecycle(repo: TestRepo) {
    let handle = repo.handle();
    let store = SnapshotStore::new(&handle);
    assert_eq!(store.load_merge_state().unwrap(), None);
    assert!(!store.clear_merge_state().unwrap());

    let first = MergeState {
        worktree_name: "feature-x".into(),
        branch_name: "feature-x".into(),
        main_branch: "main".into(),
        conflicted: true,
        timestamp: now(),
        snapshot_id: None,
        conflicted_paths: vec!["shared.txt".into()],
    };
    store.save_merge_state(&first).unwrap();
    assert_eq!(store.load_merge_state().unwrap(), Some(first.clone()));

    let second = MergeState {
        worktree_name: "feature-y".into(),
        branch_name: "feature-y".into(),
        ..first
    };
    store.save_merge_state(&second).unwrap();
    assert_eq!(store.load_merge_state().unwrap(), Some(second));

    assert!(store.clear_merge_state().unwrap());
    assert_eq!(store.load_merge_state().unwrap(), None);
}
