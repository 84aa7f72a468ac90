//! Processor-under-test contract and its harness.
//!
//! ## Design Decisions
//!
//! - **Normalized controls**: every control is a `[0, 1]` value held in a
//!   shared [`ControlBank`]. The processor receives the bank on each
//!   `process` call and maps values onto its own units, usually through the
//!   [`ControlRange`] it declares.
//!
//! - **Static metadata**: names, defaults and ranges are `'static` tables so
//!   the UI side can read them through a [`ProcessorHandle`] without touching
//!   the processor, which lives on the audio thread.
//!
//! - **Object-safe**: processors are selected at composition time and held as
//!   `Box<dyn Processor>`.

use std::sync::Arc;

use crate::buffer::AudioBlock;
use crate::control::{ControlBank, ControlInfo, ControlRange, ControlSpec};
use crate::error::{StageError, StageResult};
use crate::routing::SlotRouting;
use crate::spec::ProcessSpec;
use crate::stage::{Lifecycle, Stage};
use crate::timing::StageTimings;

/// Contract every processor-under-test implements.
///
/// Indexing a control at or beyond [`num_controls`](Self::num_controls) is a
/// contract violation and panics.
///
/// # Example
///
/// ```rust
/// use benchtop_core::{
///     AudioBlock, ControlBank, ControlRange, ControlSpec, ProcessSpec, Processor, StageResult,
/// };
///
/// const CONTROLS: &[ControlSpec] = &[ControlSpec::new("Level", 1.0, ControlRange::UNIT)];
///
/// struct Level;
///
/// impl Processor for Level {
///     fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
///         Ok(())
///     }
///
///     fn process(&mut self, block: &mut AudioBlock<'_>, controls: &ControlBank) -> StageResult {
///         block.multiply_by(controls.get_f32(0));
///         Ok(())
///     }
///
///     fn reset(&mut self) -> StageResult {
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "Level"
///     }
///
///     fn controls(&self) -> &'static [ControlSpec] {
///         CONTROLS
///     }
/// }
///
/// assert_eq!(Level.num_controls(), 1);
/// assert_eq!(Level.default_control_value(0), 1.0);
/// ```
pub trait Processor: Send {
    /// Configure for `spec`. Called off the realtime path.
    fn prepare(&mut self, spec: &ProcessSpec) -> StageResult;

    /// Process `block` in place using the current control values.
    fn process(&mut self, block: &mut AudioBlock<'_>, controls: &ControlBank) -> StageResult;

    /// Clear internal state without touching controls.
    fn reset(&mut self) -> StageResult;

    /// Display name, also used as the persistence key.
    fn name(&self) -> &'static str;

    /// Declared controls, in index order.
    fn controls(&self) -> &'static [ControlSpec];

    /// Number of controls.
    fn num_controls(&self) -> usize {
        self.controls().len()
    }

    /// Name of control `index`.
    fn control_name(&self, index: usize) -> &'static str {
        self.controls()[index].name
    }

    /// Default normalized value of control `index`.
    fn default_control_value(&self, index: usize) -> f64 {
        self.controls()[index].default
    }

    /// Real-world range of control `index`.
    fn control_range(&self, index: usize) -> ControlRange {
        self.controls()[index].range
    }
}

/// Zero-control processor that leaves its input untouched.
///
/// Fills a slot that has no processor assigned.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl Processor for PassThrough {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    #[inline]
    fn process(&mut self, _block: &mut AudioBlock<'_>, _controls: &ControlBank) -> StageResult {
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Thru"
    }

    fn controls(&self) -> &'static [ControlSpec] {
        &[]
    }
}

/// Binds a processor to its control bank and remembers the prepared spec.
pub struct ProcessorHarness {
    processor: Box<dyn Processor>,
    controls: Arc<ControlBank>,
    current_spec: Option<ProcessSpec>,
}

impl ProcessorHarness {
    /// Wrap `processor`, with every control at its default.
    pub fn new(processor: Box<dyn Processor>) -> Self {
        let controls = Arc::new(ControlBank::from_specs(processor.controls()));
        Self {
            processor,
            controls,
            current_spec: None,
        }
    }

    /// The wrapped processor.
    pub fn processor(&self) -> &dyn Processor {
        self.processor.as_ref()
    }

    /// Display name of the wrapped processor.
    pub fn name(&self) -> &'static str {
        self.processor.name()
    }

    /// Shared control bank.
    pub fn controls(&self) -> &Arc<ControlBank> {
        &self.controls
    }

    /// Store a normalized control value.
    pub fn set_control_value(&self, index: usize, value: f64) {
        self.controls.set(index, value);
    }

    /// Normalized control value.
    pub fn control_value(&self, index: usize) -> f64 {
        self.controls.get(index)
    }

    /// Normalized control value as `f32`.
    pub fn control_value_f32(&self, index: usize) -> f32 {
        self.controls.get_f32(index)
    }

    /// The `ProcessSpec` of the last successful `prepare`, if any.
    pub fn current_process_spec(&self) -> Option<ProcessSpec> {
        self.current_spec
    }
}

impl Lifecycle for ProcessorHarness {
    fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        self.processor.prepare(spec)?;
        self.current_spec = Some(*spec);
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        self.processor.reset()
    }
}

impl Stage for ProcessorHarness {
    #[inline]
    fn process(&mut self, block: &mut AudioBlock<'_>) -> StageResult {
        let Some(spec) = self.current_spec else {
            return Err(StageError::NotPrepared {
                stage: self.processor.name(),
            });
        };
        debug_assert!(
            block.num_samples() <= spec.block_len(),
            "block of {} frames exceeds prepared block size {}",
            block.num_samples(),
            spec.block_size
        );
        self.processor.process(block, &self.controls)
    }
}

impl std::fmt::Debug for ProcessorHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorHarness")
            .field("processor", &self.processor.name())
            .field("controls", &self.controls)
            .field("current_spec", &self.current_spec)
            .finish()
    }
}

/// Non-realtime view of one processor slot.
///
/// Cloning is cheap; every clone observes and drives the same slot.
#[derive(Debug, Clone)]
pub struct ProcessorHandle {
    name: &'static str,
    specs: &'static [ControlSpec],
    controls: Arc<ControlBank>,
    timings: Arc<StageTimings>,
    routing: Arc<SlotRouting>,
}

impl ProcessorHandle {
    pub(crate) fn new(
        harness: &ProcessorHarness,
        timings: Arc<StageTimings>,
        routing: Arc<SlotRouting>,
    ) -> Self {
        Self {
            name: harness.name(),
            specs: harness.processor().controls(),
            controls: Arc::clone(harness.controls()),
            timings,
            routing,
        }
    }

    /// Processor display name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of controls.
    pub fn num_controls(&self) -> usize {
        self.specs.len()
    }

    /// Name of control `index`.
    pub fn control_name(&self, index: usize) -> &'static str {
        self.specs[index].name
    }

    /// Default normalized value of control `index`.
    pub fn default_control_value(&self, index: usize) -> f64 {
        self.specs[index].default
    }

    /// Real-world range of control `index`.
    pub fn control_range(&self, index: usize) -> ControlRange {
        self.specs[index].range
    }

    /// Owned metadata of every control.
    pub fn control_info(&self) -> Vec<ControlInfo> {
        self.specs.iter().map(ControlInfo::from).collect()
    }

    /// Store a normalized control value.
    pub fn set_control_value(&self, index: usize, value: f64) {
        self.controls.set(index, value);
    }

    /// Normalized control value.
    pub fn control_value(&self, index: usize) -> f64 {
        self.controls.get(index)
    }

    /// Normalized control value as `f32`.
    pub fn control_value_f32(&self, index: usize) -> f32 {
        self.controls.get_f32(index)
    }

    /// All current normalized values.
    pub fn control_values(&self) -> Vec<f64> {
        self.controls.values()
    }

    /// Timing statistics of the slot's processor.
    pub fn timings(&self) -> &Arc<StageTimings> {
        &self.timings
    }

    /// Routing flags of the slot.
    pub fn routing(&self) -> &SlotRouting {
        &self.routing
    }

    /// Clear the slot's timing statistics.
    pub fn reset_statistics(&self) {
        self.timings.reset_statistics();
    }
}
