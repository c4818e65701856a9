pub(crate) mod backup;
pub(crate) mod merge;
pub(crate) mod ports;

pub(crate) use backup::{
    handle_backup_delete, handle_backup_list, handle_backup_prune, handle_backup_restore,
    handle_backup_state,
};
pub(crate) use merge::handle_merge;
pub(crate) use ports::handle_ports;

use std::path::Path;

use wtport::config::Config;
use wtport::topology::RepositoryHandle;

/// Resolve the repository containing `cwd` and load its configuration.
pub(crate) fn open_repository(cwd: &Path) -> anyhow::Result<(RepositoryHandle, Config)> {
    let handle = RepositoryHandle::resolve(cwd)?;
    let config = Config::load(handle.main_root())?;
    Ok((handle, config))
}

/// First eight characters of a commit id.
pub(crate) fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(8)]
}
