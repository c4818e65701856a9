//! Configuration
//!
//! Layered lowest to highest priority:
//!
//! 1. built-in defaults
//! 2. user config (`~/.config/wtport/config.toml` or platform equivalent)
//! 3. project config (`.wtport.toml` in the main checkout)
//! 4. `WTPORT_*` environment variables (`WTPORT_MAIN_BRANCH`,
//!    `WTPORT_AUTO_CLEANUP`, `WTPORT_BASE_DIR`)
//!
//! Keys are kebab-case:
//!
//! ```toml
//! main-branch = "main"
//! auto-cleanup = true
//! base-dir = ".worktrees"
//! ```

mod path;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Case, ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};

pub use path::{get_config_path, set_config_path};

/// Project config file at the main root.
pub const PROJECT_CONFIG_FILE: &str = ".wtport.toml";
/// Directory at the main root holding the tool's own state.
pub const TOOL_DIR: &str = ".wtport";
/// Prefix older releases gave worktree directories (`wt-<name>`).
pub const LEGACY_DIR_PREFIX: &str = "wt-";

const ENV_PREFIX: &str = "WTPORT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Branch merges land on. Detected from the repository when unset.
    pub main_branch: Option<String>,
    /// Remove a worktree, its branch, and its ports after a successful merge.
    pub auto_cleanup: bool,
    /// Where worktrees live; relative paths are resolved against the main root.
    pub base_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_branch: None,
            auto_cleanup: false,
            base_dir: ".worktrees".to_string(),
        }
    }
}

impl Config {
    /// Load all layers for the repository rooted at `main_root`.
    pub fn load(main_root: &Path) -> Result<Self, ConfigError> {
        let user = get_config_path();
        let project = main_root.join(PROJECT_CONFIG_FILE);
        Self::load_layers(user.as_deref(), Some(&project), None)
    }

    /// Build from explicit layers. `env` replaces the process environment
    /// when given, which keeps tests hermetic.
    pub fn load_layers(
        user: Option<&Path>,
        project: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        for path in [user, project].into_iter().flatten() {
            if path.exists() {
                log::debug!("Loading config from {}", path.display());
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
        }

        // WTPORT_BASE_DIR -> base-dir
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .convert_case(Case::Kebab)
                .source(env),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_dir.trim().is_empty() {
            return Err(ConfigError::Message("base-dir must not be empty".into()));
        }
        if let Some(branch) = &self.main_branch
            && branch.trim().is_empty()
        {
            return Err(ConfigError::Message("main-branch must not be empty".into()));
        }
        Ok(())
    }

    /// Directory that holds worktrees for the repository at `main_root`.
    pub fn worktrees_dir(&self, main_root: &Path) -> PathBuf {
        crate::path::resolve_relative(main_root, Path::new(&self.base_dir))
    }

    /// Where the naming convention places a worktree called `name`.
    pub fn worktree_path(&self, main_root: &Path, name: &str) -> PathBuf {
        self.worktrees_dir(main_root).join(name)
    }
}

/// Whether a repository-relative path belongs to the tool itself rather
/// than to the project (the project config file and the tool directory).
pub fn is_tool_artifact(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    path == PROJECT_CONFIG_FILE
        || path == TOOL_DIR
        || path
            .strip_prefix(TOOL_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
}
