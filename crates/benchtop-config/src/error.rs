//! Error types for settings persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading or saving the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings from '{path}': {source}")]
    ReadFile {
        /// Settings file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file could not be written.
    #[error("cannot write settings to '{path}': {source}")]
    WriteFile {
        /// Settings file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not a valid settings document.
    #[error("malformed settings: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The settings could not be rendered as TOML.
    #[error("cannot serialize settings: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// The settings directory could not be created.
    #[error("cannot create settings directory '{path}': {source}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// [`ConfigError::ReadFile`] for `path`.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::WriteFile`] for `path`.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::CreateDir`] for `path`.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
