//! Port reservations held by worktrees.
//!
//! Allocation belongs to other commands; the merge flow only releases a
//! worktree's ports once the worktree is gone. The registry is a JSON map at
//! `.wtport/ports.json`:
//!
//! ```json
//! { "worktrees": { "feature-x": [3001, 3002] } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

const PORTS_FILE: &str = "ports.json";

/// Releases whatever a worktree had reserved.
pub trait PortManager {
    /// Returns the ports that were freed (possibly none).
    fn release_ports(&self, worktree: &str) -> anyhow::Result<Vec<u16>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAssignments {
    #[serde(default)]
    pub worktrees: BTreeMap<String, Vec<u16>>,
}

/// File-backed [`PortManager`].
#[derive(Debug, Clone)]
pub struct PortRegistry {
    path: PathBuf,
}

impl PortRegistry {
    /// Registry kept in `tool_dir` (normally `<main root>/.wtport`).
    pub fn new(tool_dir: &Path) -> Self {
        Self {
            path: tool_dir.join(PORTS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> anyhow::Result<PortAssignments> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PortAssignments::default());
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.path.display())),
        };
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn save(&self, assignments: &PortAssignments) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(assignments)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))
    }
}

impl PortManager for PortRegistry {
    fn release_ports(&self, worktree: &str) -> anyhow::Result<Vec<u16>> {
        let mut assignments = self.list()?;
        let Some(released) = assignments.worktrees.remove(worktree) else {
            return Ok(Vec::new());
        };
        self.save(&assignments)?;
        log::debug!("Released ports {released:?} held by {worktree}");
        Ok(released)
    }
}
