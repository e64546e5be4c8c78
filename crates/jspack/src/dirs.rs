use std::path::PathBuf;

use etcetera::{BaseStrategy, choose_base_strategy};

/// Name of the configuration file looked up in the user and project directories
pub const CONFIG_FILE_NAME: &str = "jspack.toml";

/// Directory holding the user-level configuration (`~/.config/jspack` on Linux)
pub fn user_config_dir() -> Option<PathBuf> {
    match choose_base_strategy() {
        Ok(strategy) => Some(strategy.config_dir().join("jspack")),
        Err(e) => {
            log::debug!("No home directory available for user config: {e}");
            None
        }
    }
}

/// Full path of the user-level configuration file, whether or not it exists
pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
