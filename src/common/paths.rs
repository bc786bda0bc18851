//! Configuration and results paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/uiflow/`
//! - macOS: `~/Library/Application Support/uiflow/`
//! - Windows: `%APPDATA%\uiflow\`

use std::io;
use std::path::{Path, PathBuf};

/// Application name used for per-user directories
const APP_NAME: &str = "uiflow";

/// Results directory used when the configuration doesn't name one
pub const DEFAULT_RESULTS_DIR: &str = "docs/results";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolve `path` against `base` unless it is already absolute
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Ensure a directory exists, creating parents as needed
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
