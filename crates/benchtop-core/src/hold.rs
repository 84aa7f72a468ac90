//! Snapshot hold state and the controller that drives it.
//!
//! A snapshot is a capture window of fixed length started from a known
//! state. [`SnapshotController::take_snapshot`] stops the device, resets
//! every stage, arms the [`HoldState`] and restarts the device. The audio
//! thread then counts samples in [`HoldState::advance`]; the first block that
//! pushes the counter strictly past the hold size expires the hold, and the
//! bench asks for the device to be closed.
//!
//! ```text
//!          take_snapshot            counter > hold_size
//!   Idle ─────────────────► Armed ─────────────────────► Expired
//!    ▲                        │                              │
//!    └──── resume_streaming ──┴──────────────────────────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use crate::device::DeviceSession;
use crate::error::DeviceError;
use crate::stage::AnalyserSwitch;

/// Default hold size in samples, one analyser capture frame.
pub const DEFAULT_HOLD_SIZE: u32 = 4096;

/// Phase of the snapshot state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPhase {
    /// Free-running; samples are not counted.
    Idle,
    /// Capturing; samples are counted towards the hold size.
    Armed,
    /// The hold size was exceeded and closure was requested.
    Expired,
}

impl HoldPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Armed,
            2 => Self::Expired,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Armed => 1,
            Self::Expired => 2,
        }
    }
}

/// Hold flag, sample counter and hold size, shared between threads.
///
/// `prepare` resets the counter and reloads the configured hold size but
/// keeps the phase, so a snapshot armed just before a device restart
/// survives the restart's `prepare`.
#[derive(Debug)]
pub struct HoldState {
    phase: AtomicU8,
    sample_counter: AtomicU64,
    hold_size: AtomicU32,
    configured_size: AtomicU32,
}

impl Default for HoldState {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_SIZE)
    }
}

impl HoldState {
    /// Idle hold with the given size in samples.
    pub fn new(hold_size: u32) -> Self {
        Self {
            phase: AtomicU8::new(HoldPhase::Idle.as_u8()),
            sample_counter: AtomicU64::new(0),
            hold_size: AtomicU32::new(hold_size),
            configured_size: AtomicU32::new(hold_size),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> HoldPhase {
        HoldPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether samples are being counted.
    pub fn is_armed(&self) -> bool {
        self.phase() == HoldPhase::Armed
    }

    /// Samples counted since the hold was armed or the device prepared.
    pub fn sample_counter(&self) -> u64 {
        self.sample_counter.load(Ordering::Acquire)
    }

    /// Hold size in effect for the running session.
    pub fn hold_size(&self) -> u32 {
        self.hold_size.load(Ordering::Acquire)
    }

    /// Hold size applied at the next `prepare`.
    pub fn configured_size(&self) -> u32 {
        self.configured_size.load(Ordering::Acquire)
    }

    /// Change the hold size for the next session.
    pub fn set_configured_size(&self, samples: u32) {
        self.configured_size.store(samples, Ordering::Release);
    }

    /// Reset the counter and reload the configured size.
    pub fn on_prepare(&self) {
        self.sample_counter.store(0, Ordering::Release);
        self.hold_size.store(self.configured_size(), Ordering::Release);
    }

    /// Start counting from zero.
    pub fn arm(&self) {
        self.sample_counter.store(0, Ordering::Release);
        self.phase.store(HoldPhase::Armed.as_u8(), Ordering::Release);
    }

    /// Stop counting.
    pub fn disarm(&self) {
        self.phase.store(HoldPhase::Idle.as_u8(), Ordering::Release);
    }

    /// Count `samples` processed frames.
    ///
    /// Returns `true` exactly once per armed window: on the block that takes
    /// the counter strictly past the hold size. Called from the audio thread.
    #[inline]
    pub fn advance(&self, samples: usize) -> bool {
        if !self.is_armed() {
            return false;
        }
        let counter = self
            .sample_counter
            .fetch_add(samples as u64, Ordering::AcqRel)
            + samples as u64;
        if counter <= u64::from(self.hold_size()) {
            return false;
        }
        self.phase
            .compare_exchange(
                HoldPhase::Armed.as_u8(),
                HoldPhase::Expired.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Drives snapshot and resume requests against a device session.
#[derive(Debug, Clone)]
pub struct SnapshotController {
    hold: Arc<HoldState>,
    analyser: AnalyserSwitch,
}

impl SnapshotController {
    /// Controller over a bench's hold state and analyser switch.
    pub fn new(hold: Arc<HoldState>, analyser: AnalyserSwitch) -> Self {
        Self { hold, analyser }
    }

    /// Shared hold state.
    pub fn hold(&self) -> &Arc<HoldState> {
        &self.hold
    }

    /// Stop the device, reset every stage, arm the hold and restart.
    ///
    /// Calling this while a snapshot is already armed starts the window
    /// over from a clean state.
    pub fn take_snapshot<D>(&self, device: &mut D) -> Result<(), DeviceError>
    where
        D: DeviceSession + ?Sized,
    {
        // The bench is only reachable once the stream has handed it back.
        device.close_device()?;
        let bench = device.bench_mut().ok_or(DeviceError::BenchLost)?;
        bench.reset_for_snapshot()?;
        self.analyser.activate();
        self.hold.arm();
        tracing::info!(
            hold_size = self.hold.configured_size(),
            "snapshot armed, restarting device"
        );
        device.restart_last_device()
    }

    /// Leave snapshot mode and restart free-running.
    ///
    /// Sources pick up where the snapshot interrupted them. Their controls
    /// are left as they are.
    pub fn resume_streaming<D>(&self, device: &mut D) -> Result<(), DeviceError>
    where
        D: DeviceSession + ?Sized,
    {
        if let Some(bench) = device.bench_mut() {
            bench.restore_sources();
        }
        self.analyser.activate();
        self.hold.disarm();
        tracing::info!("resuming streaming");
        device.restart_last_device()
    }
}
