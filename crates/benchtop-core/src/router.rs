//! Two-source, two-processor signal router.
//!
//! Per block, and for slot A then slot B:
//!
//! 1. a disabled slot is skipped entirely; its processor is not called and
//!    its timing statistics do not move
//! 2. the slot input is built from the connected sources (sum, copy, or
//!    silence) in the shared scratch block
//! 3. the processor runs in place on the scratch block
//! 4. an inverted slot is multiplied by -1, a muted slot is silenced
//! 5. the first enabled slot is copied to the output, the second is added
//!
//! With no enabled slot the output is silence. Nothing here is carried from
//! one block to the next except processor state.

use std::sync::Arc;

use crate::buffer::AudioBlock;
use crate::error::StageResult;
use crate::processor::{PassThrough, Processor, ProcessorHandle, ProcessorHarness};
use crate::routing::{RoutingFlags, SlotRouting};
use crate::spec::ProcessSpec;
use crate::timing::TimedStage;

/// Identifies one of the two sources or processor slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    /// First slot.
    A,
    /// Second slot.
    B,
}

impl SlotId {
    /// Both slots in processing order.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// Array index of the slot.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    /// Single-letter label.
    pub fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// Build a slot's input from the two source blocks.
///
/// Both connected gives `a + b`, one connected gives a copy of it, neither
/// gives silence.
#[inline]
pub fn mix_slot_input(
    flags: RoutingFlags,
    a: &AudioBlock<'_>,
    b: &AudioBlock<'_>,
    dest: &mut AudioBlock<'_>,
) {
    match (flags.source_a, flags.source_b) {
        (true, true) => {
            dest.copy_from(a);
            dest.add_from(b);
        }
        (true, false) => dest.copy_from(a),
        (false, true) => dest.copy_from(b),
        (false, false) => dest.clear(),
    }
}

/// One processor-under-test with its routing and timing.
pub struct ProcessorSlot {
    stage: TimedStage<ProcessorHarness>,
    routing: Arc<SlotRouting>,
    handle: ProcessorHandle,
}

impl ProcessorSlot {
    /// Slot with default routing.
    pub fn new(processor: Box<dyn Processor>) -> Self {
        Self::with_routing(processor, RoutingFlags::default())
    }

    /// Slot with the given initial routing.
    pub fn with_routing(processor: Box<dyn Processor>, flags: RoutingFlags) -> Self {
        let stage = TimedStage::new(ProcessorHarness::new(processor));
        let routing = Arc::new(SlotRouting::new(flags));
        let handle = ProcessorHandle::new(
            stage.inner(),
            Arc::clone(stage.timings()),
            Arc::clone(&routing),
        );
        Self {
            stage,
            routing,
            handle,
        }
    }

    /// Slot holding the pass-through processor.
    pub fn pass_through() -> Self {
        Self::new(Box::new(PassThrough))
    }

    /// Non-realtime handle of this slot.
    pub fn handle(&self) -> &ProcessorHandle {
        &self.handle
    }

    /// The harness around the processor.
    pub fn harness(&self) -> &ProcessorHarness {
        self.stage.inner()
    }

    /// Timed `prepare` of the processor.
    pub fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        self.stage.prepare(spec)
    }

    /// Timed `reset` of the processor.
    pub fn reset(&mut self) -> StageResult {
        self.stage.reset()
    }

    fn render(
        &mut self,
        a: &AudioBlock<'_>,
        b: &AudioBlock<'_>,
        scratch: &mut AudioBlock<'_>,
    ) -> Option<StageResult> {
        let flags = self.routing.load();
        if !flags.enabled {
            return None;
        }
        mix_slot_input(flags, a, b, scratch);
        if let Err(e) = self.stage.process(scratch) {
            return Some(Err(e));
        }
        if flags.inverted {
            scratch.multiply_by(-1.0);
        }
        if flags.muted {
            scratch.clear();
        }
        Some(Ok(()))
    }
}

impl std::fmt::Debug for ProcessorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorSlot")
            .field("processor", &self.handle.name())
            .field("routing", &self.routing.load())
            .finish_non_exhaustive()
    }
}

/// Evaluates the fixed two-slot topology once per block.
#[derive(Debug)]
pub struct SignalRouter {
    slots: [ProcessorSlot; 2],
}

impl Default for SignalRouter {
    fn default() -> Self {
        Self::new(ProcessorSlot::pass_through(), ProcessorSlot::pass_through())
    }
}

impl SignalRouter {
    /// Router over two slots.
    pub fn new(a: ProcessorSlot, b: ProcessorSlot) -> Self {
        Self { slots: [a, b] }
    }

    /// One slot.
    pub fn slot(&self, id: SlotId) -> &ProcessorSlot {
        &self.slots[id.index()]
    }

    /// One slot, mutably.
    pub fn slot_mut(&mut self, id: SlotId) -> &mut ProcessorSlot {
        &mut self.slots[id.index()]
    }

    /// Prepare both processors.
    pub fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        for slot in &mut self.slots {
            slot.prepare(spec)?;
        }
        Ok(())
    }

    /// Reset both processors.
    pub fn reset(&mut self) -> StageResult {
        for slot in &mut self.slots {
            slot.reset()?;
        }
        Ok(())
    }

    /// Route `a` and `b` through both slots into `output`.
    ///
    /// `scratch` is the per-slot working block. On a processor failure the
    /// error is returned immediately and `output` holds partial data.
    pub fn route(
        &mut self,
        a: &AudioBlock<'_>,
        b: &AudioBlock<'_>,
        scratch: &mut AudioBlock<'_>,
        output: &mut AudioBlock<'_>,
    ) -> StageResult {
        let mut combined = false;
        for slot in &mut self.slots {
            match slot.render(a, b, scratch) {
                None => continue,
                Some(Err(e)) => return Err(e),
                Some(Ok(())) => {}
            }
            if combined {
                output.add_from(scratch);
            } else {
                output.copy_from(scratch);
                combined = true;
            }
        }
        if !combined {
            output.clear();
        }
        Ok(())
    }
}
