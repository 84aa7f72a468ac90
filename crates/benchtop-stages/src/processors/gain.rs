//! Gain processor.

use benchtop_core::{
    AudioBlock, ControlBank, ControlRange, ControlSpec, ProcessSpec, Processor, StageResult,
};

use crate::monitor::db_to_linear;

const GAIN_RANGE: ControlRange = ControlRange::new(-60.0, 12.0);

const CONTROLS: &[ControlSpec] = &[ControlSpec::new("Gain", 60.0 / 72.0, GAIN_RANGE)];

/// Broadband gain in dB.
///
/// ## Controls
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Gain | -60.0–12.0 dB (linear map) | 0.0 dB |
#[derive(Debug, Default, Clone, Copy)]
pub struct Gain;

impl Gain {
    /// Index of the gain control.
    pub const GAIN: usize = 0;

    /// Normalized control value for `db`.
    pub fn normalize_db(db: f64) -> f64 {
        GAIN_RANGE.normalize_linear(db)
    }
}

impl Processor for Gain {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, controls: &ControlBank) -> StageResult {
        let db = GAIN_RANGE.map_linear(controls.get(Self::GAIN)) as f32;
        block.multiply_by(db_to_linear(db));
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Gain"
    }

    fn controls(&self) -> &'static [ControlSpec] {
        CONTROLS
    }
}
