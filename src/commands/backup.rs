use std::path::Path;
use std::time::Duration;

use color_print::cformat;
use wtport::backup::{RestoreOptions, SnapshotStore};
use wtport::path::format_path_for_display;
use wtport::styling::{
    eprintln, format_heading, info_message, println, progress_message, success_message,
};
use wtport::utils::{format_age, now};

use super::{open_repository, short_sha};

pub(crate) fn handle_backup_list(cwd: &Path) -> anyhow::Result<()> {
    let (handle, _) = open_repository(cwd)?;
    let store = SnapshotStore::new(&handle);
    let snapshots = store.list()?;

    if snapshots.is_empty() {
        eprintln!("{}", info_message("No backups"));
        return Ok(());
    }

    let root = format_path_for_display(&store.root());
    println!("{}", format_heading("Backups", Some(&root)));
    let now = now();
    for snapshot in snapshots {
        let branch = snapshot.branch.as_deref().unwrap_or("(detached)");
        let changes = if snapshot.saved_state.is_empty() {
            String::new()
        } else {
            format!(
                ", {} uncommitted file(s) saved",
                snapshot.saved_state.changed_paths.len()
            )
        };
        println!(
            "{}",
            cformat!(
                "<bold>{}</>  {} {}@{}  <dim>{}{changes}</>",
                snapshot.id,
                snapshot.operation,
                branch,
                short_sha(&snapshot.commit),
                format_age(snapshot.created_at, now)
            )
        );
    }
    Ok(())
}

pub(crate) fn handle_backup_restore(cwd: &Path, id: &str, keep_changes: bool) -> anyhow::Result<()> {
    let (handle, _) = open_repository(cwd)?;
    eprintln!("{}", progress_message(cformat!("Restoring backup <bold>{id}</>...")));
    let snapshot = SnapshotStore::new(&handle).restore(id, RestoreOptions { keep_changes })?;
    let target = snapshot.branch.as_deref().unwrap_or("detached HEAD");
    eprintln!(
        "{}",
        success_message(cformat!(
            "Restored <bold>{target}</> to {}",
            short_sha(&snapshot.commit)
        ))
    );
    Ok(())
}

pub(crate) fn handle_backup_delete(cwd: &Path, id: &str) -> anyhow::Result<()> {
    let (handle, _) = open_repository(cwd)?;
    SnapshotStore::new(&handle).delete(id)?;
    eprintln!("{}", success_message(cformat!("Deleted backup <bold>{id}</>")));
    Ok(())
}

pub(crate) fn handle_backup_prune(cwd: &Path, older_than: Duration) -> anyhow::Result<()> {
    let (handle, _) = open_repository(cwd)?;
    let removed = SnapshotStore::new(&handle).prune(older_than)?;
    if removed.is_empty() {
        eprintln!("{}", info_message("No backups to prune"));
    } else {
        for id in &removed {
            println!("{id}");
        }
        eprintln!(
            "{}",
            success_message(format!("Pruned {} backup(s)", removed.len()))
        );
    }
    Ok(())
}

pub(crate) fn handle_backup_state(cwd: &Path, clear: bool) -> anyhow::Result<()> {
    let (handle, _) = open_repository(cwd)?;
    let store = SnapshotStore::new(&handle);

    if clear {
        if store.clear_merge_state()? {
            eprintln!("{}", success_message("Cleared merge state"));
        } else {
            eprintln!("{}", info_message("No merge state recorded"));
        }
        return Ok(());
    }

    let Some(state) = store.load_merge_state()? else {
        eprintln!("{}", info_message("No merge state recorded"));
        return Ok(());
    };
    println!("worktree:    {}", state.worktree_name);
    println!("branch:      {}", state.branch_name);
    println!("main-branch: {}", state.main_branch);
    println!("conflicted:  {}", state.conflicted);
    println!("timestamp:   {}", state.timestamp.to_rfc3339());
    if let Some(id) = &state.snapshot_id {
        println!("snapshot:    {id}");
    }
    for path in &state.conflicted_paths {
        println!("conflict:    {path}");
    }
    Ok(())
}
