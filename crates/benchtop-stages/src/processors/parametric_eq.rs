//! Single-band parametric equalizer.
//!
//! One RBJ peaking biquad per channel. Coefficients are recomputed at the
//! start of a block only when a control moved.

use benchtop_core::{
    AudioBlock, ControlBank, ControlRange, ControlSpec, ProcessSpec, Processor, StageError,
    StageResult,
};

use crate::biquad::{Biquad, peaking_eq_coefficients};

const FREQUENCY_RANGE: ControlRange = ControlRange::new(20.0, 20000.0);
const GAIN_RANGE: ControlRange = ControlRange::new(-36.0, 36.0);

/// Bandwidth of the peak.
const Q: f32 = 0.707;

const CONTROLS: &[ControlSpec] = &[
    // 440 Hz on the logarithmic map
    ControlSpec::new("Frequency", 0.447_474_226_940_735_46, FREQUENCY_RANGE),
    ControlSpec::new("Gain", 0.5, GAIN_RANGE),
];

/// Peaking EQ with frequency and gain controls.
///
/// ## Controls
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Frequency | 20.0–20000.0 Hz (log map) | 440.0 Hz |
/// | 1 | Gain | -36.0–36.0 dB (linear map) | 0.0 dB |
///
/// # Example
///
/// ```rust
/// use benchtop_core::{AudioBlock, ControlBank, ProcessSpec, Processor};
/// use benchtop_stages::ParametricEq;
///
/// let mut eq = ParametricEq::new();
/// let controls = ControlBank::from_specs(eq.controls());
/// controls.set(ParametricEq::FREQUENCY, ParametricEq::normalize_frequency(1000.0));
/// controls.set(ParametricEq::GAIN, ParametricEq::normalize_gain(6.0));
///
/// eq.prepare(&ProcessSpec::new(48000.0, 256, 1)).unwrap();
/// let mut samples = [0.0f32; 256];
/// samples[0] = 1.0;
/// eq.process(&mut AudioBlock::from_mono(&mut samples), &controls).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParametricEq {
    filters: Vec<Biquad>,
    sample_rate: f32,
    /// Frequency and gain the coefficients were computed for.
    tuned: Option<(f32, f32)>,
}

impl ParametricEq {
    /// Index of the frequency control.
    pub const FREQUENCY: usize = 0;
    /// Index of the gain control.
    pub const GAIN: usize = 1;

    /// Unprepared equalizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized control value for a frequency in Hz.
    pub fn normalize_frequency(hz: f64) -> f64 {
        FREQUENCY_RANGE.normalize_log(hz)
    }

    /// Normalized control value for a gain in dB.
    pub fn normalize_gain(db: f64) -> f64 {
        GAIN_RANGE.normalize_linear(db)
    }

    fn retune(&mut self, controls: &ControlBank) {
        let nyquist_guard = 0.49 * self.sample_rate;
        let frequency = (FREQUENCY_RANGE.map_log(controls.get(Self::FREQUENCY)) as f32).min(nyquist_guard);
        let gain_db = GAIN_RANGE.map_linear(controls.get(Self::GAIN)) as f32;
        if self.tuned == Some((frequency, gain_db)) {
            return;
        }
        let coefficients = peaking_eq_coefficients(frequency, Q, gain_db, self.sample_rate);
        for filter in &mut self.filters {
            filter.set_coefficients(coefficients);
        }
        self.tuned = Some((frequency, gain_db));
    }
}

impl Processor for ParametricEq {
    fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        self.sample_rate = spec.sample_rate as f32;
        self.filters = vec![Biquad::new(); spec.channels()];
        self.tuned = None;
        Ok(())
    }

    fn process(&mut self, block: &mut AudioBlock<'_>, controls: &ControlBank) -> StageResult {
        debug_assert!(
            block.num_channels() <= self.filters.len(),
            "block has more channels than prepared"
        );
        self.retune(controls);
        for (ch, filter) in self.filters.iter_mut().enumerate().take(block.num_channels()) {
            let lane = block.channel_mut(ch);
            filter.process_slice(lane);
            if lane.last().is_some_and(|s| !s.is_finite()) {
                return Err(StageError::NonFinite { stage: "PEQ" });
            }
        }
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        for filter in &mut self.filters {
            filter.clear();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "PEQ"
    }

    fn controls(&self) -> &'static [ControlSpec] {
        CONTROLS
    }
}
