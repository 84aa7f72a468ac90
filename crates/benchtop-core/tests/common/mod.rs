//! Fixture stages and a manually pumped device shared by the integration
//! and property tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use benchtop_core::{
    Analyser, AudioBlock, AudioBuffer, Bench, BenchBuilder, CloseSignal, ControlBank,
    ControlRange, ControlSpec, DeviceError, DeviceSession, Lifecycle, ProcessSpec, Processor,
    Source, SourceMode, Stage, StageError, StageResult, close_channel,
};

pub const SAMPLE_RATE: f64 = 48000.0;
pub const BLOCK: u32 = 512;
pub const CHANNELS: u32 = 2;

pub fn spec() -> ProcessSpec {
    ProcessSpec::new(SAMPLE_RATE, BLOCK, CHANNELS)
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Counts snapshot hook calls on a source.
#[derive(Debug, Default)]
pub struct SourceLog {
    pub persisted: AtomicUsize,
    pub rewound: AtomicUsize,
    pub restored: AtomicUsize,
}

/// Source that writes a constant, or passes the device input through.
pub struct ConstSource {
    value: f32,
    mode: SourceMode,
    log: Arc<SourceLog>,
}

impl ConstSource {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            mode: SourceMode::Generate,
            log: Arc::default(),
        }
    }

    pub fn external() -> Self {
        Self {
            mode: SourceMode::ExternalInput,
            ..Self::new(0.0)
        }
    }

    pub fn log(&self) -> Arc<SourceLog> {
        Arc::clone(&self.log)
    }
}

impl Lifecycle for ConstSource {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        Ok(())
    }
}

impl Stage for ConstSource {
    fn process(&mut self, block: &mut AudioBlock<'_>) -> StageResult {
        if self.mode == SourceMode::Generate {
            block.fill(self.value);
        }
        Ok(())
    }
}

impl Source for ConstSource {
    fn mode(&self) -> SourceMode {
        self.mode
    }

    fn persist_state(&mut self) {
        self.log.persisted.fetch_add(1, Ordering::SeqCst);
    }

    fn restore_for_snapshot(&mut self) {
        self.log.rewound.fetch_add(1, Ordering::SeqCst);
    }

    fn restore_persisted_state(&mut self) {
        self.log.restored.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "const"
    }
}

// ---------------------------------------------------------------------------
// Analyser and monitor
// ---------------------------------------------------------------------------

/// Analyser that counts the blocks and resets it sees.
#[derive(Default)]
pub struct CountingAnalyser {
    pub blocks: Arc<AtomicUsize>,
    pub resets: Arc<AtomicUsize>,
}

impl Lifecycle for CountingAnalyser {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Analyser for CountingAnalyser {
    fn analyse(&mut self, _block: &AudioBlock<'_>) -> StageResult {
        self.blocks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Monitor that leaves the output untouched.
pub struct UnityMonitor;

impl Lifecycle for UnityMonitor {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        Ok(())
    }
}

impl Stage for UnityMonitor {
    fn process(&mut self, _block: &mut AudioBlock<'_>) -> StageResult {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Processors
// ---------------------------------------------------------------------------

const LEVEL: &[ControlSpec] = &[ControlSpec::new("Level", 0.5, ControlRange::new(-4.0, 4.0))];

/// Overwrites its input with a constant taken from its only control.
pub struct Constant;

impl Constant {
    /// Normalized control value producing `level`.
    pub fn normalized(level: f64) -> f64 {
        LEVEL[0].range.normalize_linear(level)
    }
}

impl Processor for Constant {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, controls: &ControlBank) -> StageResult {
        block.fill(LEVEL[0].range.map_linear(controls.get(0)) as f32);
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Constant"
    }

    fn controls(&self) -> &'static [ControlSpec] {
        LEVEL
    }
}

/// Fails every `process` call.
pub struct Broken;

impl Processor for Broken {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, _controls: &ControlBank) -> StageResult {
        block.fill(f32::NAN);
        Err(StageError::NonFinite { stage: "Broken" })
    }

    fn reset(&mut self) -> StageResult {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Broken"
    }

    fn controls(&self) -> &'static [ControlSpec] {
        &[]
    }
}

// ---------------------------------------------------------------------------
// Bench and device
// ---------------------------------------------------------------------------

/// Builder over two constant sources, a counting analyser and a unity monitor.
pub fn builder(a: f32, b: f32) -> (BenchBuilder, Arc<AtomicUsize>) {
    let analyser = CountingAnalyser::default();
    let blocks = Arc::clone(&analyser.blocks);
    let builder = BenchBuilder::new(
        Box::new(ConstSource::new(a)),
        Box::new(ConstSource::new(b)),
        Box::new(analyser),
        Box::new(UnityMonitor),
    );
    (builder, blocks)
}

/// Bench and close signal from a builder.
pub fn build(builder: BenchBuilder) -> (Bench, CloseSignal) {
    let (requester, signal) = close_channel();
    (builder.build(requester), signal)
}

/// Device whose "audio thread" is the test calling [`ManualDevice::pump`].
pub struct ManualDevice {
    bench: Box<Bench>,
    spec: ProcessSpec,
    open: bool,
    io: AudioBuffer,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl ManualDevice {
    pub fn new(bench: Bench, spec: ProcessSpec) -> Self {
        Self {
            bench: Box::new(bench),
            spec,
            open: false,
            io: AudioBuffer::for_spec(&spec),
            opens: Arc::default(),
            closes: Arc::default(),
        }
    }

    /// Run one full block through the bench with `input` on every channel.
    pub fn pump(&mut self, input: f32) -> Result<Vec<f32>, StageError> {
        assert!(self.open, "pumping a closed device");
        let mut block = self.io.block();
        block.fill(input);
        self.bench.process_block(&mut block)?;
        Ok(block.channel(0).to_vec())
    }
}

impl DeviceSession for ManualDevice {
    fn current_active_input_channel_count(&self) -> u32 {
        if self.open { self.spec.channel_count } else { 0 }
    }

    fn current_active_output_channel_count(&self) -> u32 {
        if self.open { self.spec.channel_count } else { 0 }
    }

    fn close_device(&mut self) -> Result<(), DeviceError> {
        if self.open {
            self.open = false;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn restart_last_device(&mut self) -> Result<(), DeviceError> {
        if !self.open {
            self.bench.prepare(&self.spec)?;
            self.open = true;
            self.opens.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn bench_mut(&mut self) -> Option<&mut Bench> {
        if self.open { None } else { Some(&mut *self.bench) }
    }
}
