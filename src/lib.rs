//! Guarded merges of git worktree branches back into the main branch.
//!
//! `wtp merge feature-x` finds the worktree, checks that both checkouts are
//! in a state worth merging, forecasts conflicts, snapshots the main
//! checkout, and only then merges. The pieces are usable on their own:
//!
//! - [`topology`] works out which checkout a directory belongs to
//! - [`locate`] maps a user-typed name to a worktree
//! - [`validate`] runs the pre-flight checks
//! - [`predict`] forecasts conflicts without touching any working tree
//! - [`backup`] takes and restores snapshots, and records conflicted merges
//! - [`merge`] sequences all of the above
//!
//! The library API is not stable.

pub mod backup;
pub mod config;
pub mod git;
pub mod locate;
pub mod merge;
pub mod path;
pub mod ports;
pub mod predict;
pub mod shell_exec;
pub mod styling;
pub mod topology;
pub mod utils;
pub mod validate;

pub use merge::{MergeOptions, MergeOutcome, merge};
pub use topology::RepositoryHandle;
