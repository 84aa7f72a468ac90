//! Error types for stages and devices.

/// Failure raised by a stage's lifecycle call.
///
/// The payloads are `&'static str` so a stage can report a failure from the
/// audio thread without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// The stage could not complete the call.
    #[error("{stage} failed: {reason}")]
    Failed {
        /// Name of the failing stage.
        stage: &'static str,
        /// Short description of the failure.
        reason: &'static str,
    },

    /// The stage produced NaN or infinite samples.
    #[error("{stage} produced non-finite samples")]
    NonFinite {
        /// Name of the failing stage.
        stage: &'static str,
    },

    /// The stage was asked to process before being prepared.
    #[error("{stage} used before prepare")]
    NotPrepared {
        /// Name of the failing stage.
        stage: &'static str,
    },
}

/// Result of a stage lifecycle call.
pub type StageResult = std::result::Result<(), StageError>;

/// Device and session failures, reported to non-realtime callers.
///
/// The core never retries a failed device operation; callers decide.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// No audio device available on the system.
    #[error("no audio device available")]
    NoDevice,

    /// The requested device was not found.
    #[error("device not found: {0}")]
    NotFound(String),

    /// Stream construction or playback failed.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// A stage failed while the device was closed for prepare or reset.
    #[error("stage failed: {0}")]
    Stage(#[from] StageError),

    /// The stream was torn down but the bench never came back.
    #[error("bench was not returned by the audio callback")]
    BenchLost,

    /// The device worker thread could not be started.
    #[error("failed to spawn device worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The device worker thread has stopped.
    #[error("device worker is not running")]
    WorkerGone,
}
