use std::path::PathBuf;
use std::sync::OnceLock;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};

static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Set the user config path override (called from the CLI `--config` flag)
pub fn set_config_path(path: PathBuf) {
    CONFIG_PATH.set(path).ok();
}

/// Location of the user config file.
///
/// Priority: `--config`, then `$WTPORT_CONFIG_PATH`, then
/// `<config dir>/wtport/config.toml` (XDG on Linux and macOS, `%APPDATA%` on
/// Windows).
pub fn get_config_path() -> Option<PathBuf> {
    if let Some(path) = CONFIG_PATH.get() {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var("WTPORT_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }

    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("wtport").join("config.toml"))
}
