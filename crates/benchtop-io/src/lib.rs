//! Audio device layer for the benchtop DSP test bench.
//!
//! This crate provides:
//!
//! - **Device enumeration**: [`list_devices`] and [`default_device`]
//! - **Duplex streaming**: [`CpalSession`], the cpal implementation of
//!   [`benchtop_core::DeviceSession`]
//! - **Block adaptation**: [`BlockAdapter`] turns the device's interleaved
//!   buffers of arbitrary length into prepared-size bench blocks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use benchtop_core::DeviceWorker;
//! use benchtop_io::{CpalSession, SessionConfig};
//!
//! let controller = bench.handle().snapshot_controller();
//! let worker = DeviceWorker::spawn(
//!     move || CpalSession::open(SessionConfig::default(), bench),
//!     controller,
//!     close_signal,
//! )?;
//! worker.take_snapshot()?;
//! ```

mod adapter;
mod devices;
mod session;

pub use adapter::BlockAdapter;
pub use devices::{AudioDevice, default_device, list_devices};
pub use session::{CpalSession, SessionConfig};

use benchtop_core::DeviceError;

/// Error types for audio device operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device rejected the requested configuration.
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfig(String),
}

/// Convenience result type for audio device operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for DeviceError {
    fn from(err: Error) -> Self {
        match err {
            Error::NoDevice => DeviceError::NoDevice,
            Error::DeviceNotFound(name) => DeviceError::NotFound(name),
            Error::Stream(msg) | Error::UnsupportedConfig(msg) => DeviceError::Stream(msg),
        }
    }
}
