use std::path::Path;

use super::Repository;
use crate::git::WorktreeRecord;

impl Repository {
    /// Every worktree in git's registry, the main checkout first.
    pub fn list_worktrees(&self) -> anyhow::Result<Vec<WorktreeRecord>> {
        let stdout = self.run_command(&["worktree", "list", "--porcelain"])?;
        Ok(WorktreeRecord::parse_porcelain_list(&stdout)?)
    }

    /// Remove a worktree. Git refuses when it has local modifications or
    /// untracked files, which is the behavior we want after a merge.
    pub fn remove_worktree(&self, path: &Path) -> anyhow::Result<()> {
        let path_str = path.to_string_lossy();
        self.run_command(&["worktree", "remove", &path_str])?;
        Ok(())
    }
}
