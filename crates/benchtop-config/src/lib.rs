//! Persisted settings for the benchtop DSP test bench.
//!
//! The core treats device configuration as an opaque blob handed over at
//! startup and taken back at shutdown. This crate gives that blob a shape
//! ([`DeviceSettings`]) and stores it, together with the routing and control
//! values of both processor slots ([`SlotSettings`]) and the snapshot hold
//! size, as one TOML file under the platform config directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use benchtop_config::{BenchSettings, paths};
//!
//! let path = paths::settings_path();
//! let mut settings = BenchSettings::load_or_default(&path).unwrap();
//! settings.device.buffer_size = 256;
//! settings.save(&path).unwrap();
//! ```

mod error;
mod settings;

/// Platform-specific configuration paths.
pub mod paths;

pub use error::{ConfigError, Result};
pub use paths::{ensure_user_config_dir, settings_path, user_config_dir};
pub use settings::{BenchSettings, DeviceSettings, SlotSettings};
