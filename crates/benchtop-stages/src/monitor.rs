//! Output monitor: gain plus a hard limiter in front of the speakers.

use std::sync::Arc;

use benchtop_core::{AtomicF32, AudioBlock, Lifecycle, ProcessSpec, Stage, StageResult};

/// Lowest monitor gain; anything below is treated as silence.
pub const MIN_GAIN_DB: f32 = -60.0;
/// Highest monitor gain.
pub const MAX_GAIN_DB: f32 = 12.0;

/// Convert decibels to linear gain.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    libm::expf(db * core::f32::consts::LN_10 / 20.0)
}

/// Convert linear gain to decibels, floored at -200 dB.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * libm::log10f(linear.max(1e-10))
}

/// Monitor gain shared with the UI thread.
#[derive(Debug, Clone)]
pub struct MonitorGain(Arc<AtomicF32>);

impl MonitorGain {
    /// Gain in dB.
    pub fn gain_db(&self) -> f32 {
        self.0.load()
    }

    /// Set the gain in dB, clamped to `[MIN_GAIN_DB, MAX_GAIN_DB]`.
    pub fn set_gain_db(&self, db: f32) {
        self.0.store(db.clamp(MIN_GAIN_DB, MAX_GAIN_DB));
    }
}

impl Default for MonitorGain {
    fn default() -> Self {
        Self(Arc::new(AtomicF32::new(0.0)))
    }
}

/// Applies the monitor gain and clips to `[-1, 1]`. Non-finite samples
/// become silence.
#[derive(Debug, Default)]
pub struct GainMonitor {
    gain: MonitorGain,
}

impl GainMonitor {
    /// Monitor at 0 dB.
    pub fn new() -> Self {
        Self::default()
    }

    /// Monitor driven by `gain`.
    pub fn with_gain(gain: MonitorGain) -> Self {
        Self { gain }
    }

    /// Shared gain handle.
    pub fn gain(&self) -> &MonitorGain {
        &self.gain
    }
}

impl Lifecycle for GainMonitor {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        Ok(())
    }
}

impl Stage for GainMonitor {
    fn process(&mut self, block: &mut AudioBlock<'_>) -> StageResult {
        let db = self.gain.gain_db();
        let gain = if db <= MIN_GAIN_DB { 0.0 } else { db_to_linear(db) };
        for ch in 0..block.num_channels() {
            for sample in block.channel_mut(ch) {
                *sample = if sample.is_finite() {
                    (*sample * gain).clamp(-1.0, 1.0)
                } else {
                    0.0
                };
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(monitor: &mut GainMonitor, input: &[f32]) -> Vec<f32> {
        let mut samples = input.to_vec();
        monitor.process(&mut AudioBlock::from_mono(&mut samples)).unwrap();
        samples
    }

    #[test]
    fn test_db_conversions() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-6.0) - 0.501_187).abs() < 1e-4);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((linear_to_db(0.0) + 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_unity_gain_limits() {
        let mut monitor = GainMonitor::new();
        assert_eq!(run(&mut monitor, &[0.5, 1.5, -3.0]), vec![0.5, 1.0, -1.0]);
    }

    #[test]
    fn test_non_finite_becomes_silence() {
        let mut monitor = GainMonitor::new();
        let out = run(&mut monitor, &[f32::NAN, f32::INFINITY, 0.25]);
        assert_eq!(out, vec![0.0, 0.0, 0.25]);
    }

    #[test]
    fn test_gain_is_shared_and_clamped() {
        let mut monitor = GainMonitor::new();
        let handle = monitor.gain().clone();
        handle.set_gain_db(-6.0);
        let out = run(&mut monitor, &[1.0]);
        assert!((out[0] - 0.501_187).abs() < 1e-4);

        handle.set_gain_db(-200.0);
        assert_eq!(handle.gain_db(), MIN_GAIN_DB);
        assert_eq!(run(&mut monitor, &[1.0]), vec![0.0]);
    }
}
