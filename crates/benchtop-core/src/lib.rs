//! Benchtop Core - realtime routing and instrumentation for a DSP test bench
//!
//! This crate evaluates a fixed signal graph once per audio callback:
//!
//! ```text
//!  Source A ─┐                 ┌─ Processor A ─┐
//!            ├─ Signal Router ─┤               ├─ Analyser ─ Monitor ─ Output
//!  Source B ─┘                 └─ Processor B ─┘
//! ```
//!
//! Every stage is wrapped in a [`TimedStage`] that records how long each
//! `prepare` / `process` / `reset` call takes, and a [`HoldState`] can freeze
//! the device after a fixed number of samples for repeatable captures.
//!
//! # Core Abstractions
//!
//! ## Blocks and Specs
//!
//! - [`ProcessSpec`] - sample rate, block size, channel count of a prepared session
//! - [`AudioBuffer`] - planar sample storage, allocated once at prepare time
//! - [`AudioBlock`] - non-owning view over an [`AudioBuffer`] (or any slice)
//!
//! ## Stages
//!
//! - [`Lifecycle`], [`Stage`], [`Source`], [`Analyser`] - stage contracts
//! - [`Processor`] - the contract every processor-under-test implements
//! - [`ProcessorHarness`] - binds a processor to its lock-free [`ControlBank`]
//! - [`PassThrough`] - zero-control null-op processor
//!
//! ## Instrumentation
//!
//! - [`TimedStage`] - times every lifecycle call of the wrapped stage
//! - [`StageTimings`] / [`TimingStatistics`] - running min / max / mean per call
//!
//! ## Realtime Graph
//!
//! - [`SignalRouter`] - two processor slots fed from two sources
//! - [`Bench`] - the per-block driver run on the audio thread
//! - [`BenchHandle`] - the non-realtime view of a running [`Bench`]
//!
//! ## Snapshots and Devices
//!
//! - [`HoldState`] / [`SnapshotController`] - deterministic capture window
//! - [`DeviceSession`] - boundary to the platform audio device
//! - [`DeviceWorker`] - background thread that owns the session and serves
//!   close / restart / snapshot requests
//!
//! # Realtime Rules
//!
//! [`Bench::process_block`] never allocates, never locks and never blocks.
//! Control values and routing flags are single-word atomics; timing statistics
//! are written on the audio thread and read elsewhere as eventually-consistent
//! values. Device closure requested from the audio thread is handed to the
//! [`DeviceWorker`] through a bounded channel, never executed inline.

pub mod atomic;
pub mod buffer;
pub mod control;
pub mod device;
pub mod error;
pub mod hold;
pub mod orchestrator;
pub mod processor;
pub mod router;
pub mod routing;
pub mod spec;
pub mod stage;
pub mod timing;

pub use atomic::{AtomicF32, AtomicF64};
pub use buffer::{AudioBlock, AudioBuffer};
pub use control::{ControlBank, ControlInfo, ControlRange, ControlSpec, ControlValue};
pub use device::{
    CloseRequester, CloseSignal, DeviceCommand, DeviceSession, DeviceWorker, close_channel,
};
pub use error::{DeviceError, StageError, StageResult};
pub use hold::{DEFAULT_HOLD_SIZE, HoldPhase, HoldState, SnapshotController};
pub use orchestrator::{Bench, BenchBuilder, BenchHandle, StageLabel};
pub use processor::{PassThrough, Processor, ProcessorHandle, ProcessorHarness};
pub use router::{ProcessorSlot, SignalRouter, SlotId, mix_slot_input};
pub use routing::{RoutingFlags, SlotRouting};
pub use spec::ProcessSpec;
pub use stage::{Analyser, AnalyserSwitch, Lifecycle, MonitorSwitch, Source, SourceMode, Stage};
pub use timing::{
    LifecycleCall, StageTimings, Statistic, TimedStage, TimingSnapshot, TimingStatistics,
};
