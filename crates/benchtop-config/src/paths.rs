//! Where the settings file lives.
//!
//! - Linux: `~/.config/benchtop/settings.toml`
//! - macOS: `~/Library/Application Support/benchtop/settings.toml`
//! - Windows: `%APPDATA%\benchtop\settings.toml`

use std::path::PathBuf;

use crate::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "benchtop";

/// File name of the persisted settings.
const SETTINGS_FILE: &str = "settings.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the default settings file path.
pub fn settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}

/// Ensure the user config directory exists.
///
/// Creates the directory and any parent directories if they don't exist.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}
