//! Configuration and log file locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/vflowctl/` and `~/.local/share/vflowctl/`
//! - macOS: `~/Library/Application Support/vflowctl/`
//! - Windows: `%APPDATA%\vflowctl\`

use std::path::PathBuf;

/// Name used for the config and data directories
const APP_NAME: &str = "vflowctl";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_dir().join("logs"))
}
