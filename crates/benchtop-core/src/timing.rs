//! Per-call latency statistics and the timed stage wrapper.
//!
//! [`TimedStage`] wraps any stage and measures the wall-clock cost of its
//! `prepare`, `process` and `reset` calls with [`Instant`]. Durations are
//! folded, in milliseconds, into one [`TimingStatistics`] per call kind.
//!
//! Statistics are written only on the thread that drives the stage (the audio
//! thread for `process`) and read from anywhere through a shared
//! [`StageTimings`]. Each field is its own atomic word, so a reader may see a
//! `sum` that already includes a sample whose `count` has not landed yet.
//! Readers treat the values as eventually consistent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::atomic::AtomicF64;
use crate::buffer::AudioBlock;
use crate::error::StageResult;
use crate::spec::ProcessSpec;
use crate::stage::{Analyser, Lifecycle, Stage};

const MIN_SENTINEL: f64 = 1.0e100;
const MAX_SENTINEL: f64 = -1.0;

/// Lifecycle call a statistic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleCall {
    /// `prepare(spec)`.
    Prepare,
    /// `process(block)`, or `analyse(block)` for analysers.
    Process,
    /// `reset()`.
    Reset,
}

impl LifecycleCall {
    /// All calls in query-index order.
    pub const ALL: [Self; 3] = [Self::Prepare, Self::Process, Self::Reset];

    /// Position in [`ALL`](Self::ALL).
    pub fn index(self) -> usize {
        match self {
            Self::Prepare => 0,
            Self::Process => 1,
            Self::Reset => 2,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Process => "process",
            Self::Reset => "reset",
        }
    }
}

/// Statistic reported for a lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    /// Mean duration in milliseconds.
    Average,
    /// Longest duration in milliseconds.
    Max,
    /// Shortest duration in milliseconds.
    Min,
    /// Number of recorded calls.
    NumSamples,
}

impl Statistic {
    /// All statistics in query-index order.
    pub const ALL: [Self; 4] = [Self::Average, Self::Max, Self::Min, Self::NumSamples];

    /// Position in [`ALL`](Self::ALL).
    pub fn index(self) -> usize {
        match self {
            Self::Average => 0,
            Self::Max => 1,
            Self::Min => 2,
            Self::NumSamples => 3,
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Running min / max / sum / count of one call kind.
///
/// `min` starts at a large positive sentinel and `max` at a negative one, so
/// the first recorded sample establishes both bounds. Until then every query
/// reports `0.0`.
#[derive(Debug)]
pub struct TimingStatistics {
    min: AtomicF64,
    max: AtomicF64,
    sum: AtomicF64,
    count: AtomicF64,
}

impl Default for TimingStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingStatistics {
    /// Fresh statistics holding no samples.
    pub fn new() -> Self {
        Self {
            min: AtomicF64::new(MIN_SENTINEL),
            max: AtomicF64::new(MAX_SENTINEL),
            sum: AtomicF64::new(0.0),
            count: AtomicF64::new(0.0),
        }
    }

    /// Fold one duration (milliseconds) into the statistics.
    ///
    /// Single writer: only the thread driving the stage calls this.
    #[inline]
    pub fn record(&self, duration_ms: f64) {
        self.min.store(self.min.load().min(duration_ms));
        self.max.store(self.max.load().max(duration_ms));
        self.sum.store(self.sum.load() + duration_ms);
        self.count.store(self.count.load() + 1.0);
    }

    /// Restore the initial sentinels.
    pub fn reset(&self) {
        self.min.store(MIN_SENTINEL);
        self.max.store(MAX_SENTINEL);
        self.sum.store(0.0);
        self.count.store(0.0);
    }

    /// Number of recorded samples.
    pub fn count(&self) -> f64 {
        self.count.load()
    }

    /// Mean duration, or `0.0` with no samples.
    pub fn average(&self) -> f64 {
        let count = self.count.load();
        if count > 0.0 {
            self.sum.load() / count
        } else {
            0.0
        }
    }

    /// Longest duration, or `0.0` with no samples.
    pub fn max(&self) -> f64 {
        if self.count.load() > 0.0 {
            self.max.load()
        } else {
            0.0
        }
    }

    /// Shortest duration, or `0.0` with no samples.
    pub fn min(&self) -> f64 {
        if self.count.load() > 0.0 {
            self.min.load()
        } else {
            0.0
        }
    }

    /// Read one statistic.
    pub fn query(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Average => self.average(),
            Statistic::Max => self.max(),
            Statistic::Min => self.min(),
            Statistic::NumSamples => self.count(),
        }
    }

    /// Copy out all four values.
    pub fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            average_ms: self.average(),
            max_ms: self.max(),
            min_ms: self.min(),
            num_samples: self.count() as u64,
        }
    }
}

/// Point-in-time copy of a [`TimingStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingSnapshot {
    /// Mean duration in milliseconds.
    pub average_ms: f64,
    /// Longest duration in milliseconds.
    pub max_ms: f64,
    /// Shortest duration in milliseconds.
    pub min_ms: f64,
    /// Number of recorded calls.
    pub num_samples: u64,
}

/// Statistics for all three lifecycle calls of one stage.
#[derive(Debug, Default)]
pub struct StageTimings {
    prepare: TimingStatistics,
    process: TimingStatistics,
    reset: TimingStatistics,
}

impl StageTimings {
    /// Fresh statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics of one call kind.
    pub fn statistics(&self, call: LifecycleCall) -> &TimingStatistics {
        match call {
            LifecycleCall::Prepare => &self.prepare,
            LifecycleCall::Process => &self.process,
            LifecycleCall::Reset => &self.reset,
        }
    }

    /// Fold a measured duration into `call`'s statistics.
    #[inline]
    pub fn record(&self, call: LifecycleCall, elapsed: Duration) {
        self.statistics(call).record(elapsed.as_secs_f64() * 1000.0);
    }

    /// Mean duration of `call` in milliseconds.
    pub fn duration_average(&self, call: LifecycleCall) -> f64 {
        self.statistics(call).average()
    }

    /// Longest duration of `call` in milliseconds.
    pub fn duration_max(&self, call: LifecycleCall) -> f64 {
        self.statistics(call).max()
    }

    /// Shortest duration of `call` in milliseconds.
    pub fn duration_min(&self, call: LifecycleCall) -> f64 {
        self.statistics(call).min()
    }

    /// Number of recorded `call`s.
    pub fn duration_num_samples(&self, call: LifecycleCall) -> f64 {
        self.statistics(call).count()
    }

    /// Read one statistic of one call.
    pub fn query(&self, call: LifecycleCall, statistic: Statistic) -> f64 {
        self.statistics(call).query(statistic)
    }

    /// Read a statistic by numeric routine and value indices.
    ///
    /// `routine` follows [`LifecycleCall::ALL`], `value` follows
    /// [`Statistic::ALL`]. Returns `None` for indices outside those tables.
    pub fn query_by_index(&self, routine: usize, value: usize) -> Option<f64> {
        let call = LifecycleCall::from_index(routine)?;
        let statistic = Statistic::from_index(value)?;
        Some(self.query(call, statistic))
    }

    /// Flatten (routine, value) into one table index, `routine * 4 + value`.
    pub const fn query_index(routine: usize, value: usize) -> usize {
        routine * Statistic::ALL.len() + value
    }

    /// Snapshot of one call's statistics.
    pub fn snapshot(&self, call: LifecycleCall) -> TimingSnapshot {
        self.statistics(call).snapshot()
    }

    /// Clear all three call kinds.
    pub fn reset_statistics(&self) {
        self.prepare.reset();
        self.process.reset();
        self.reset.reset();
    }
}

/// Wraps a stage and times each of its lifecycle calls.
///
/// Errors from the wrapped stage are returned unchanged; the attempted call
/// is recorded before the error propagates.
pub struct TimedStage<S> {
    stage: S,
    timings: Arc<StageTimings>,
}

impl<S> TimedStage<S> {
    /// Wrap `stage` with fresh statistics.
    pub fn new(stage: S) -> Self {
        Self::with_timings(stage, Arc::new(StageTimings::new()))
    }

    /// Wrap `stage`, recording into existing statistics.
    pub fn with_timings(stage: S, timings: Arc<StageTimings>) -> Self {
        Self { stage, timings }
    }

    /// The wrapped stage.
    pub fn inner(&self) -> &S {
        &self.stage
    }

    /// The wrapped stage, mutably. Calls made through this are not timed.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    /// Shared statistics handle.
    pub fn timings(&self) -> &Arc<StageTimings> {
        &self.timings
    }

    /// Clear all statistics.
    pub fn reset_statistics(&self) {
        self.timings.reset_statistics();
    }

    #[inline]
    fn timed<F>(&mut self, call: LifecycleCall, f: F) -> StageResult
    where
        F: FnOnce(&mut S) -> StageResult,
    {
        let start = Instant::now();
        let result = f(&mut self.stage);
        self.timings.record(call, start.elapsed());
        result
    }
}

impl<S: Lifecycle> TimedStage<S> {
    /// Timed `prepare`.
    pub fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        self.timed(LifecycleCall::Prepare, |s| s.prepare(spec))
    }

    /// Timed `reset`.
    pub fn reset(&mut self) -> StageResult {
        self.timed(LifecycleCall::Reset, |s| s.reset())
    }
}

impl<S: Stage> TimedStage<S> {
    /// Timed in-place `process`.
    #[inline]
    pub fn process(&mut self, block: &mut AudioBlock<'_>) -> StageResult {
        self.timed(LifecycleCall::Process, |s| s.process(block))
    }
}

impl<S: Analyser> TimedStage<S> {
    /// Timed non-mutating `analyse`, recorded as a process call.
    #[inline]
    pub fn analyse(&mut self, block: &AudioBlock<'_>) -> StageResult {
        self.timed(LifecycleCall::Process, |s| s.analyse(block))
    }
}

impl<S> std::fmt::Debug for TimedStage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedStage")
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;

    struct Failing;

    impl Lifecycle for Failing {
        fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
            Ok(())
        }

        fn reset(&mut self) -> StageResult {
            Ok(())
        }
    }

    impl Stage for Failing {
        fn process(&mut self, _block: &mut AudioBlock<'_>) -> StageResult {
            Err(StageError::Failed {
                stage: "failing",
                reason: "always",
            })
        }
    }

    #[test]
    fn test_empty_statistics_report_zero() {
        let stats = TimingStatistics::new();
        assert_eq!(stats.average(), 0.0);
        assert_eq!(stats.min(), 0.0);
        assert_eq!(stats.max(), 0.0);
        assert_eq!(stats.count(), 0.0);
    }

    #[test]
    fn test_first_sample_sets_both_bounds() {
        let stats = TimingStatistics::new();
        stats.record(0.5);
        assert_eq!(stats.min(), 0.5);
        assert_eq!(stats.max(), 0.5);
        stats.record(1.5);
        stats.record(0.25);
        assert_eq!(stats.min(), 0.25);
        assert_eq!(stats.max(), 1.5);
        assert!((stats.average() - 0.75).abs() < 1e-12);
        assert_eq!(stats.snapshot().num_samples, 3);
    }

    #[test]
    fn test_query_index_layout() {
        assert_eq!(StageTimings::query_index(0, 0), 0);
        assert_eq!(StageTimings::query_index(1, 3), 7);
        assert_eq!(StageTimings::query_index(2, 3), 11);

        let timings = StageTimings::new();
        timings.record(LifecycleCall::Reset, Duration::from_secs(2));
        assert_eq!(timings.query_by_index(2, 3), Some(1.0));
        assert_eq!(timings.query_by_index(2, 1), Some(2000.0));
        assert_eq!(timings.query_by_index(3, 0), None);
        assert_eq!(timings.query_by_index(0, 4), None);
    }

    #[test]
    fn test_failed_call_is_still_recorded() {
        let mut stage = TimedStage::new(Failing);
        let mut data = [0.0_f32; 4];
        let mut block = AudioBlock::from_mono(&mut data);
        let err = stage.process(&mut block).unwrap_err();
        assert!(matches!(err, StageError::Failed { stage: "failing", .. }));
        assert_eq!(
            stage.timings().duration_num_samples(LifecycleCall::Process),
            1.0
        );
        assert_eq!(
            stage.timings().duration_num_samples(LifecycleCall::Prepare),
            0.0
        );
    }
}
