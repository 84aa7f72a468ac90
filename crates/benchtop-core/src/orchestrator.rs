//! The per-block driver.
//!
//! [`Bench`] owns every stage, the source and scratch buffers and the hold
//! state. It is built once, moved into the audio callback while the device
//! runs and handed back when the device closes. Everything the rest of the
//! program needs while it streams lives in a [`BenchHandle`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::buffer::{AudioBlock, AudioBuffer};
use crate::device::CloseRequester;
use crate::error::{StageError, StageResult};
use crate::hold::{DEFAULT_HOLD_SIZE, HoldState, SnapshotController};
use crate::processor::{PassThrough, Processor, ProcessorHandle};
use crate::router::{ProcessorSlot, SignalRouter, SlotId};
use crate::routing::RoutingFlags;
use crate::spec::ProcessSpec;
use crate::stage::{Analyser, AnalyserSwitch, MonitorSwitch, Source, SourceMode, Stage};
use crate::timing::{StageTimings, TimedStage};

/// Names a timed stage of the bench for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLabel {
    /// Signal source A or B.
    Source(SlotId),
    /// Processor-under-test in slot A or B.
    Processor(SlotId),
    /// The analyser tap.
    Analyser,
    /// The monitor.
    Monitor,
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(id) => write!(f, "source {}", id.label()),
            Self::Processor(id) => write!(f, "processor {}", id.label()),
            Self::Analyser => f.write_str("analyser"),
            Self::Monitor => f.write_str("monitor"),
        }
    }
}

/// Builder for [`Bench`].
pub struct BenchBuilder {
    sources: [Box<dyn Source>; 2],
    analyser: Box<dyn Analyser>,
    monitor: Box<dyn Stage>,
    processors: [Box<dyn Processor>; 2],
    routing: [RoutingFlags; 2],
    hold_size: u32,
}

impl BenchBuilder {
    /// Start a bench from its fixed collaborators.
    ///
    /// Both processor slots start with [`PassThrough`] and default routing.
    pub fn new(
        source_a: Box<dyn Source>,
        source_b: Box<dyn Source>,
        analyser: Box<dyn Analyser>,
        monitor: Box<dyn Stage>,
    ) -> Self {
        Self {
            sources: [source_a, source_b],
            analyser,
            monitor,
            processors: [Box::new(PassThrough), Box::new(PassThrough)],
            routing: [RoutingFlags::default(); 2],
            hold_size: DEFAULT_HOLD_SIZE,
        }
    }

    /// Put `processor` into slot `id`.
    pub fn processor(mut self, id: SlotId, processor: Box<dyn Processor>) -> Self {
        self.processors[id.index()] = processor;
        self
    }

    /// Initial routing of slot `id`.
    pub fn routing(mut self, id: SlotId, flags: RoutingFlags) -> Self {
        self.routing[id.index()] = flags;
        self
    }

    /// Snapshot hold size in samples.
    pub fn hold_size(mut self, samples: u32) -> Self {
        self.hold_size = samples;
        self
    }

    /// Build the bench. `close` is signalled when a hold expires.
    pub fn build(self, close: CloseRequester) -> Bench {
        let [proc_a, proc_b] = self.processors;
        let [routing_a, routing_b] = self.routing;
        let router = SignalRouter::new(
            ProcessorSlot::with_routing(proc_a, routing_a),
            ProcessorSlot::with_routing(proc_b, routing_b),
        );
        let [source_a, source_b] = self.sources;
        let sources = [TimedStage::new(source_a), TimedStage::new(source_b)];
        let analyser = TimedStage::new(self.analyser);
        let monitor = TimedStage::new(self.monitor);

        let handle = BenchHandle {
            processors: [
                router.slot(SlotId::A).handle().clone(),
                router.slot(SlotId::B).handle().clone(),
            ],
            source_names: [
                sources[0].inner().name().to_string(),
                sources[1].inner().name().to_string(),
            ],
            source_timings: [
                Arc::clone(sources[0].timings()),
                Arc::clone(sources[1].timings()),
            ],
            analyser_timings: Arc::clone(analyser.timings()),
            monitor_timings: Arc::clone(monitor.timings()),
            analyser: AnalyserSwitch::default(),
            monitor: MonitorSwitch::default(),
            hold: Arc::new(HoldState::new(self.hold_size)),
            stage_errors: Arc::new(AtomicU64::new(0)),
        };

        Bench {
            sources,
            source_buffers: [AudioBuffer::new(0, 0), AudioBuffer::new(0, 0)],
            scratch: AudioBuffer::new(0, 0),
            router,
            analyser,
            monitor,
            close,
            spec: None,
            handle,
        }
    }
}

/// Sources, router, analyser and monitor, driven once per block.
pub struct Bench {
    sources: [TimedStage<Box<dyn Source>>; 2],
    source_buffers: [AudioBuffer; 2],
    scratch: AudioBuffer,
    router: SignalRouter,
    analyser: TimedStage<Box<dyn Analyser>>,
    monitor: TimedStage<Box<dyn Stage>>,
    close: CloseRequester,
    spec: Option<ProcessSpec>,
    handle: BenchHandle,
}

impl Bench {
    /// Non-realtime handle onto this bench.
    pub fn handle(&self) -> &BenchHandle {
        &self.handle
    }

    /// The `ProcessSpec` of the last successful `prepare`.
    pub fn current_spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    /// The router and its processor slots.
    pub fn router(&self) -> &SignalRouter {
        &self.router
    }

    /// Allocate every buffer for `spec` and prepare every stage.
    ///
    /// Resets the hold counter and reloads the configured hold size; an armed
    /// snapshot stays armed.
    pub fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        self.spec = None;
        self.source_buffers = [AudioBuffer::for_spec(spec), AudioBuffer::for_spec(spec)];
        self.scratch = AudioBuffer::for_spec(spec);

        for source in &mut self.sources {
            source.prepare(spec)?;
        }
        self.router.prepare(spec)?;
        self.analyser.prepare(spec)?;
        self.monitor.prepare(spec)?;

        self.handle.hold.on_prepare();
        self.spec = Some(*spec);
        Ok(())
    }

    /// Reset every stage without touching the sources' generator state.
    pub fn reset(&mut self) -> StageResult {
        for source in &mut self.sources {
            source.reset()?;
        }
        self.router.reset()?;
        self.analyser.reset()?;
        self.monitor.reset()
    }

    /// Bring every stage into the known start state of a snapshot.
    ///
    /// Persists then rewinds both sources, and resets processors, analyser
    /// and monitor.
    pub fn reset_for_snapshot(&mut self) -> StageResult {
        for source in &mut self.sources {
            let source = source.inner_mut();
            source.persist_state();
            source.restore_for_snapshot();
        }
        self.router.reset()?;
        self.analyser.reset()?;
        self.monitor.reset()
    }

    /// Put the sources back where the last snapshot interrupted them.
    pub fn restore_sources(&mut self) {
        for source in &mut self.sources {
            source.inner_mut().restore_persisted_state();
        }
    }

    /// Process one block in place.
    ///
    /// `io` holds the device input on entry and the output on return. It must
    /// have the prepared channel count and at most the prepared block size.
    /// If any stage fails, `io` is silenced, the failure is counted and the
    /// error returned; the hold still counts the block.
    pub fn process_block(&mut self, io: &mut AudioBlock<'_>) -> StageResult {
        let result = self.render(io);
        if result.is_err() {
            io.clear();
            self.handle.stage_errors.fetch_add(1, Ordering::Relaxed);
        }

        if self.handle.hold.advance(io.num_samples()) {
            self.handle.analyser.suspend();
            self.close.request_close();
        }
        result
    }

    fn render(&mut self, io: &mut AudioBlock<'_>) -> StageResult {
        let Some(spec) = self.spec else {
            return Err(StageError::NotPrepared { stage: "bench" });
        };
        let frames = io.num_samples();
        debug_assert!(
            frames <= spec.block_len(),
            "block of {frames} frames exceeds prepared block size {}",
            spec.block_size
        );

        for (source, buffer) in self.sources.iter_mut().zip(&mut self.source_buffers) {
            buffer.set_len(frames);
            let mut block = buffer.block();
            if source.inner().mode() == SourceMode::ExternalInput {
                block.copy_from(io);
            }
            source.process(&mut block)?;
        }

        self.scratch.set_len(frames);
        let [buffer_a, buffer_b] = &mut self.source_buffers;
        let a = buffer_a.block();
        let b = buffer_b.block();
        let mut scratch = self.scratch.block();
        self.router.route(&a, &b, &mut scratch, io)?;

        if self.handle.analyser.is_active() {
            self.analyser.analyse(io)?;
        }

        if self.handle.monitor.is_muted() {
            io.clear();
            Ok(())
        } else {
            self.monitor.process(io)
        }
    }
}

impl fmt::Debug for Bench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bench")
            .field("router", &self.router)
            .field("spec", &self.spec)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Non-realtime view of a [`Bench`]: controls, routing, switches, hold
/// state and timing statistics.
#[derive(Debug, Clone)]
pub struct BenchHandle {
    processors: [ProcessorHandle; 2],
    source_names: [String; 2],
    source_timings: [Arc<StageTimings>; 2],
    analyser_timings: Arc<StageTimings>,
    monitor_timings: Arc<StageTimings>,
    analyser: AnalyserSwitch,
    monitor: MonitorSwitch,
    hold: Arc<HoldState>,
    stage_errors: Arc<AtomicU64>,
}

impl BenchHandle {
    /// Processor slot `id`.
    pub fn processor(&self, id: SlotId) -> &ProcessorHandle {
        &self.processors[id.index()]
    }

    /// Display name of source `id`.
    pub fn source_name(&self, id: SlotId) -> &str {
        &self.source_names[id.index()]
    }

    /// Timing statistics of source `id`.
    pub fn source_timings(&self, id: SlotId) -> &Arc<StageTimings> {
        &self.source_timings[id.index()]
    }

    /// Timing statistics of the analyser.
    pub fn analyser_timings(&self) -> &Arc<StageTimings> {
        &self.analyser_timings
    }

    /// Timing statistics of the monitor.
    pub fn monitor_timings(&self) -> &Arc<StageTimings> {
        &self.monitor_timings
    }

    /// Every timed stage in graph order.
    pub fn stage_timings(&self) -> Vec<(StageLabel, Arc<StageTimings>)> {
        let mut stages = Vec::with_capacity(6);
        for id in SlotId::ALL {
            stages.push((StageLabel::Source(id), Arc::clone(self.source_timings(id))));
        }
        for id in SlotId::ALL {
            stages.push((
                StageLabel::Processor(id),
                Arc::clone(self.processor(id).timings()),
            ));
        }
        stages.push((StageLabel::Analyser, Arc::clone(&self.analyser_timings)));
        stages.push((StageLabel::Monitor, Arc::clone(&self.monitor_timings)));
        stages
    }

    /// Clear the statistics of every stage.
    pub fn reset_statistics(&self) {
        for (_, timings) in self.stage_timings() {
            timings.reset_statistics();
        }
    }

    /// Analyser active flag.
    pub fn analyser(&self) -> &AnalyserSwitch {
        &self.analyser
    }

    /// Monitor mute flag.
    pub fn monitor(&self) -> &MonitorSwitch {
        &self.monitor
    }

    /// Hold state.
    pub fn hold(&self) -> &Arc<HoldState> {
        &self.hold
    }

    /// Number of blocks silenced because a stage failed.
    pub fn stage_errors(&self) -> u64 {
        self.stage_errors.load(Ordering::Relaxed)
    }

    /// Controller for snapshot and resume requests on this bench.
    pub fn snapshot_controller(&self) -> SnapshotController {
        SnapshotController::new(Arc::clone(&self.hold), self.analyser.clone())
    }
}
