use std::path::PathBuf;
use std::time::Duration;

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Args, Parser, Subcommand};

/// Custom styles for help output, matching the status message colors
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| format!("invalid duration `{s}`: {e}"))
}

#[derive(Parser)]
#[command(name = "wtp")]
#[command(about = "Merge worktree branches back safely", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "\
Getting started

  wtp merge feature-x            # Validate, snapshot, and merge feature-x
  wtp merge feature-x --check    # Only predict conflicts
  wtp backup list                # Snapshots taken before merges
  wtp backup restore ID          # Undo a merge

Exit codes: 0 success, 1 conflicts, 2 not merged")]
pub(crate) struct Cli {
    /// Working directory for this command
    #[arg(
        short = 'C',
        global = true,
        value_name = "path",
        display_order = 100,
        help_heading = "Global Options"
    )]
    pub directory: Option<PathBuf>,

    /// User config file path
    #[arg(
        long,
        global = true,
        value_name = "path",
        display_order = 101,
        help_heading = "Global Options"
    )]
    pub config: Option<PathBuf>,

    /// Show debug info, including every git command run
    #[arg(
        long,
        short = 'v',
        global = true,
        action = clap::ArgAction::Count,
        display_order = 102,
        help_heading = "Global Options"
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Merge a worktree's branch into the main branch
    ///
    /// Checks both checkouts, predicts conflicts, and snapshots the main
    /// checkout before merging. On conflict the main checkout is left
    /// mid-merge for you to resolve; the snapshot can undo it.
    #[command(after_long_help = "\
Examples

  wtp merge feature-x              # Merge, asking before risky steps
  wtp merge                        # Merge the worktree you are in
  wtp merge feature-x --check      # Preview predicted conflicts only
  wtp merge feature-x --force      # Skip prediction, allow a dirty worktree
  wtp merge feature-x --delete -y  # Merge and remove the worktree")]
    Merge(MergeArgs),

    /// Inspect and restore safety snapshots
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Show ports reserved by worktrees
    Ports,
}

#[derive(Args)]
pub(crate) struct MergeArgs {
    /// Worktree name, directory, or branch (defaults to the current worktree)
    pub name: Option<String>,

    /// Merge past uncommitted worktree changes and skip conflict prediction
    #[arg(long)]
    pub force: bool,

    /// Predict conflicts and stop; nothing is changed
    #[arg(long, conflicts_with = "force")]
    pub check: bool,

    /// Remove the worktree and its branch after merging
    #[arg(long, overrides_with = "no_delete")]
    pub delete: bool,

    /// Keep the worktree even when auto-cleanup is enabled
    #[arg(long, overrides_with = "delete")]
    pub no_delete: bool,

    /// Answer yes to every question
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub(crate) enum BackupCommand {
    /// List snapshots, oldest first
    List,

    /// Return the main checkout to a snapshot's branch and commit
    Restore {
        /// Snapshot id
        id: String,

        /// Keep current uncommitted changes (fails rather than overwrite them)
        #[arg(long)]
        keep_changes: bool,
    },

    /// Delete a snapshot record (its commits stay reachable)
    Delete {
        /// Snapshot id
        id: String,
    },

    /// Delete snapshots older than a given age
    Prune {
        /// Age such as `30d` or `12h`
        #[arg(long, value_parser = parse_duration)]
        older_than: Duration,
    },

    /// Show the record left by the last conflicted merge
    State {
        /// Remove the record
        #[arg(long)]
        clear: bool,
    },
}
