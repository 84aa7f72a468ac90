//! Stage contracts and the shared switches of analyser and monitor.
//!
//! A stage is anything the bench calls once per block: sources, processor
//! harnesses, the analyser tap and the monitor. All of them share the
//! [`Lifecycle`] half of the contract; [`Stage`] adds in-place processing,
//! [`Analyser`] a read-only tap and [`Source`] the generator mode plus
//! snapshot hooks.
//!
//! Stages are moved onto the audio thread, hence the `Send` bound.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::buffer::AudioBlock;
use crate::error::StageResult;
use crate::spec::ProcessSpec;

/// Prepare / reset half of every stage contract.
pub trait Lifecycle: Send {
    /// Allocate and configure for `spec`. Called off the realtime path.
    fn prepare(&mut self, spec: &ProcessSpec) -> StageResult;

    /// Return internal state to its initial condition.
    fn reset(&mut self) -> StageResult;
}

/// A stage that processes blocks in place.
pub trait Stage: Lifecycle {
    /// Read and overwrite `block`. Must not allocate, lock or block.
    fn process(&mut self, block: &mut AudioBlock<'_>) -> StageResult;
}

/// How a source fills its working buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// The source synthesises its own signal.
    Generate,
    /// The device input is copied into the working buffer before `process`.
    ExternalInput,
}

/// A signal source feeding the router.
pub trait Source: Stage {
    /// Current fill mode, read once per block.
    fn mode(&self) -> SourceMode;

    /// Remember the transient generator state a snapshot rewind would
    /// discard. User-facing controls are not part of it.
    fn persist_state(&mut self);

    /// Put generator state into the canonical start position so a snapshot
    /// is reproducible.
    fn restore_for_snapshot(&mut self);

    /// Reapply the state stored by [`persist_state`](Self::persist_state).
    fn restore_persisted_state(&mut self) {}

    /// Display name.
    fn name(&self) -> &str;
}

/// A read-only tap on the processed output.
pub trait Analyser: Lifecycle {
    /// Observe `block` without modifying it.
    fn analyse(&mut self, block: &AudioBlock<'_>) -> StageResult;
}

impl<T: Lifecycle + ?Sized> Lifecycle for Box<T> {
    fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        (**self).prepare(spec)
    }

    fn reset(&mut self) -> StageResult {
        (**self).reset()
    }
}

impl<T: Stage + ?Sized> Stage for Box<T> {
    #[inline]
    fn process(&mut self, block: &mut AudioBlock<'_>) -> StageResult {
        (**self).process(block)
    }
}

impl<T: Source + ?Sized> Source for Box<T> {
    fn mode(&self) -> SourceMode {
        (**self).mode()
    }

    fn persist_state(&mut self) {
        (**self).persist_state();
    }

    fn restore_for_snapshot(&mut self) {
        (**self).restore_for_snapshot();
    }

    fn restore_persisted_state(&mut self) {
        (**self).restore_persisted_state();
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Analyser + ?Sized> Analyser for Box<T> {
    #[inline]
    fn analyse(&mut self, block: &AudioBlock<'_>) -> StageResult {
        (**self).analyse(block)
    }
}

/// Active flag of the analyser, shared between threads.
#[derive(Debug, Clone)]
pub struct AnalyserSwitch(Arc<AtomicBool>);

impl Default for AnalyserSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AnalyserSwitch {
    /// Create a switch in the given state.
    pub fn new(active: bool) -> Self {
        Self(Arc::new(AtomicBool::new(active)))
    }

    /// Whether the analyser is fed each block.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Start feeding the analyser.
    pub fn activate(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Stop feeding the analyser.
    pub fn suspend(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Mute flag of the monitor, shared between threads.
#[derive(Debug, Clone, Default)]
pub struct MonitorSwitch(Arc<AtomicBool>);

impl MonitorSwitch {
    /// Whether the output is silenced instead of monitored.
    #[inline]
    pub fn is_muted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Mute or unmute the output.
    pub fn set_muted(&self, muted: bool) {
        self.0.store(muted, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches_are_shared_between_clones() {
        let analyser = AnalyserSwitch::default();
        let other = analyser.clone();
        assert!(other.is_active());
        analyser.suspend();
        assert!(!other.is_active());
        other.activate();
        assert!(analyser.is_active());

        let monitor = MonitorSwitch::default();
        assert!(!monitor.is_muted());
        monitor.clone().set_muted(true);
        assert!(monitor.is_muted());
    }
}
