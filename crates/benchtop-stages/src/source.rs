//! Test signal sources.
//!
//! A [`SignalSource`] either synthesises one of the [`Waveform`]s or passes
//! the device input through. Frequency and level live in a shared
//! [`SourceControls`] so they can be changed from the UI thread while the
//! source runs on the audio thread.
//!
//! For snapshots the source can rewind to a canonical start (phase zero,
//! noise generator reseeded), which makes two snapshots of the same settings
//! sample-identical. The position it left is saved first and put back when
//! streaming resumes.

use core::f32::consts::PI;
use std::sync::Arc;

use benchtop_core::{
    AtomicF32, AudioBlock, Lifecycle, ProcessSpec, Source, SourceMode, Stage, StageResult,
};
use libm::sinf;

/// Seed of the white noise generator after a rewind.
pub const NOISE_SEED: u32 = 0x2545_F491;

/// Generated waveform of a [`SignalSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    /// Sine at the source frequency.
    #[default]
    Sine,
    /// Uniform white noise in `[-level, level)`.
    WhiteNoise,
    /// Impulses of height `level` repeating at the source frequency; a
    /// zero frequency gives a single impulse.
    Impulse,
    /// Digital silence.
    Silence,
}

impl Waveform {
    /// All waveforms in display order.
    pub const ALL: [Self; 4] = [Self::Sine, Self::WhiteNoise, Self::Impulse, Self::Silence];

    /// Short lowercase name, also accepted by the CLI.
    pub fn label(self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::WhiteNoise => "noise",
            Self::Impulse => "impulse",
            Self::Silence => "silence",
        }
    }

    /// Parse a [`label`](Self::label).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.label().eq_ignore_ascii_case(label))
    }
}

/// Frequency and level of a source, shared with the UI thread.
#[derive(Debug, Clone)]
pub struct SourceControls {
    inner: Arc<ControlCells>,
}

#[derive(Debug)]
struct ControlCells {
    frequency: AtomicF32,
    level: AtomicF32,
}

impl SourceControls {
    /// Controls starting at `frequency` Hz and linear `level`.
    pub fn new(frequency: f32, level: f32) -> Self {
        Self {
            inner: Arc::new(ControlCells {
                frequency: AtomicF32::new(frequency.max(0.0)),
                level: AtomicF32::new(level),
            }),
        }
    }

    /// Frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.inner.frequency.load()
    }

    /// Set the frequency in Hz. Negative values are clamped to zero.
    pub fn set_frequency(&self, hz: f32) {
        self.inner.frequency.store(hz.max(0.0));
    }

    /// Linear output level.
    pub fn level(&self) -> f32 {
        self.inner.level.load()
    }

    /// Set the linear output level.
    pub fn set_level(&self, level: f32) {
        self.inner.level.store(level);
    }
}

impl Default for SourceControls {
    fn default() -> Self {
        Self::new(440.0, 0.5)
    }
}

/// Playback position of a generator, kept across a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Playback {
    phase: f32,
    noise_state: u32,
    impulse_countdown: u32,
}

/// Oscillator, noise or impulse generator, or device input pass-through.
///
/// # Example
///
/// ```rust
/// use benchtop_core::{AudioBlock, Lifecycle, ProcessSpec, Stage};
/// use benchtop_stages::{SignalSource, Waveform};
///
/// let mut source = SignalSource::new(Waveform::Sine);
/// source.controls().set_frequency(1000.0);
/// source.prepare(&ProcessSpec::new(48000.0, 64, 1)).unwrap();
///
/// let mut samples = [0.0f32; 64];
/// source.process(&mut AudioBlock::from_mono(&mut samples)).unwrap();
/// assert_eq!(samples[0], 0.0);
/// assert!(samples[12] > 0.0);
/// ```
#[derive(Debug)]
pub struct SignalSource {
    waveform: Waveform,
    mode: SourceMode,
    controls: SourceControls,
    sample_rate: f32,
    /// Normalized phase in `[0, 1)`.
    phase: f32,
    noise_state: u32,
    /// Samples until the next impulse.
    impulse_countdown: u32,
    persisted: Option<Playback>,
}

impl SignalSource {
    /// Generator of `waveform` with default controls (440 Hz, level 0.5).
    pub fn new(waveform: Waveform) -> Self {
        Self::with_controls(waveform, SourceControls::default())
    }

    /// Generator of `waveform` driven by `controls`.
    pub fn with_controls(waveform: Waveform, controls: SourceControls) -> Self {
        Self {
            waveform,
            mode: SourceMode::Generate,
            controls,
            sample_rate: 48000.0,
            phase: 0.0,
            noise_state: NOISE_SEED,
            impulse_countdown: 0,
            persisted: None,
        }
    }

    /// Pass the device input through unchanged.
    pub fn external_input() -> Self {
        Self {
            mode: SourceMode::ExternalInput,
            ..Self::new(Waveform::Silence)
        }
    }

    /// Generated waveform. Meaningless for an external input source.
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Shared controls.
    pub fn controls(&self) -> &SourceControls {
        &self.controls
    }

    #[inline]
    fn next_noise(&mut self) -> f32 {
        self.noise_state = self
            .noise_state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        let upper = (self.noise_state >> 16) as u16;
        f32::from(upper) / 32_768.0 - 1.0
    }

    #[inline]
    fn advance_phase(&mut self, increment: f32) {
        self.phase += increment;
        if self.phase >= 1.0 {
            self.phase -= libm::floorf(self.phase);
        }
    }

    fn render(&mut self, lane: &mut [f32]) {
        let level = self.controls.level();
        match self.waveform {
            Waveform::Sine => {
                let increment = (self.controls.frequency() / self.sample_rate).min(1.0);
                for sample in lane {
                    *sample = level * sinf(2.0 * PI * self.phase);
                    self.advance_phase(increment);
                }
            }
            Waveform::WhiteNoise => {
                for sample in lane {
                    *sample = level * self.next_noise();
                }
            }
            Waveform::Impulse => {
                let frequency = self.controls.frequency();
                let period = if frequency > 0.0 {
                    (self.sample_rate / frequency).round().max(1.0) as u32
                } else {
                    u32::MAX
                };
                for sample in lane {
                    *sample = if self.impulse_countdown == 0 {
                        self.impulse_countdown = period;
                        level
                    } else {
                        0.0
                    };
                    self.impulse_countdown -= 1;
                }
            }
            Waveform::Silence => lane.fill(0.0),
        }
    }
}

impl Lifecycle for SignalSource {
    fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        self.sample_rate = spec.sample_rate as f32;
        Ok(())
    }

    /// Generator state survives a reset; a snapshot rewinds it explicitly.
    fn reset(&mut self) -> StageResult {
        Ok(())
    }
}

impl Stage for SignalSource {
    fn process(&mut self, block: &mut AudioBlock<'_>) -> StageResult {
        if self.mode == SourceMode::ExternalInput || block.num_channels() == 0 {
            return Ok(());
        }
        self.render(block.channel_mut(0));
        block.spread_first_channel();
        Ok(())
    }
}

impl Source for SignalSource {
    fn mode(&self) -> SourceMode {
        self.mode
    }

    /// Frequency and level are not touched; they belong to the controls.
    fn persist_state(&mut self) {
        self.persisted = Some(Playback {
            phase: self.phase,
            noise_state: self.noise_state,
            impulse_countdown: self.impulse_countdown,
        });
    }

    fn restore_for_snapshot(&mut self) {
        self.phase = 0.0;
        self.noise_state = NOISE_SEED;
        self.impulse_countdown = 0;
    }

    fn restore_persisted_state(&mut self) {
        if let Some(playback) = self.persisted.take() {
            self.phase = playback.phase;
            self.noise_state = playback.noise_state;
            self.impulse_countdown = playback.impulse_countdown;
        }
    }

    fn name(&self) -> &str {
        match self.mode {
            SourceMode::ExternalInput => "input",
            SourceMode::Generate => self.waveform.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &mut SignalSource, frames: usize) -> Vec<f32> {
        let mut samples = vec![0.0; frames];
        source.process(&mut AudioBlock::from_mono(&mut samples)).unwrap();
        samples
    }

    fn prepared(waveform: Waveform) -> SignalSource {
        let mut source = SignalSource::new(waveform);
        source.prepare(&ProcessSpec::new(48000.0, 512, 1)).unwrap();
        source
    }

    #[test]
    fn test_waveform_labels_roundtrip() {
        for waveform in Waveform::ALL {
            assert_eq!(Waveform::from_label(waveform.label()), Some(waveform));
        }
        assert_eq!(Waveform::from_label("NOISE"), Some(Waveform::WhiteNoise));
        assert_eq!(Waveform::from_label("saw"), None);
    }

    #[test]
    fn test_sine_peak_tracks_level() {
        let mut source = prepared(Waveform::Sine);
        source.controls().set_frequency(1000.0);
        source.controls().set_level(0.8);
        let samples = render(&mut source, 480);
        let peak = samples.iter().fold(0.0_f32, |p, s| p.max(s.abs()));
        assert!((peak - 0.8).abs() < 1e-3, "peak {peak}");
    }

    #[test]
    fn test_noise_stays_in_range() {
        let mut source = prepared(Waveform::WhiteNoise);
        source.controls().set_level(1.0);
        let samples = render(&mut source, 4096);
        assert!(samples.iter().all(|s| (-1.0..1.0).contains(s)));
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!(mean.abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn test_impulse_repeats_each_period() {
        let mut source = prepared(Waveform::Impulse);
        source.controls().set_frequency(4800.0);
        source.controls().set_level(1.0);
        let samples = render(&mut source, 30);
        let hits: Vec<usize> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(hits, vec![0, 10, 20]);
    }

    #[test]
    fn test_zero_frequency_impulse_fires_once() {
        let mut source = prepared(Waveform::Impulse);
        source.controls().set_frequency(0.0);
        let samples = render(&mut source, 16);
        assert_eq!(samples.iter().filter(|s| **s != 0.0).count(), 1);
        source.restore_for_snapshot();
        assert_ne!(render(&mut source, 1)[0], 0.0);
    }

    #[test]
    fn test_rewind_repeats_output() {
        for waveform in [Waveform::Sine, Waveform::WhiteNoise] {
            let mut source = prepared(waveform);
            let first = render(&mut source, 300);
            render(&mut source, 77);
            source.restore_for_snapshot();
            assert_eq!(render(&mut source, 300), first);
        }
    }

    #[test]
    fn test_resume_continues_playback_and_keeps_control_edits() {
        let mut source = prepared(Waveform::Sine);
        render(&mut source, 100);
        source.persist_state();
        let mut reference = prepared(Waveform::Sine);
        render(&mut reference, 100);

        source.restore_for_snapshot();
        render(&mut source, 33);
        source.restore_persisted_state();
        assert_eq!(render(&mut source, 50), render(&mut reference, 50));

        source.persist_state();
        source.controls().set_frequency(1000.0);
        source.controls().set_level(0.25);
        source.restore_persisted_state();
        assert_eq!(source.controls().frequency(), 1000.0);
        assert_eq!(source.controls().level(), 0.25);
    }

    #[test]
    fn test_restore_without_persist_is_noop() {
        let mut source = prepared(Waveform::WhiteNoise);
        let mut reference = prepared(Waveform::WhiteNoise);
        render(&mut source, 10);
        render(&mut reference, 10);
        source.restore_persisted_state();
        assert_eq!(render(&mut source, 20), render(&mut reference, 20));
    }

    #[test]
    fn test_external_input_leaves_block_alone() {
        let mut source = SignalSource::external_input();
        assert_eq!(source.mode(), SourceMode::ExternalInput);
        assert_eq!(source.name(), "input");
        let mut samples = [0.3; 8];
        source.process(&mut AudioBlock::from_mono(&mut samples)).unwrap();
        assert_eq!(samples, [0.3; 8]);
    }

    #[test]
    fn test_all_channels_carry_the_signal() {
        let mut source = prepared(Waveform::WhiteNoise);
        let mut data = vec![0.0; 2 * 64];
        let mut block = AudioBlock::new(&mut data, 2, 64, 64);
        source.process(&mut block).unwrap();
        assert_eq!(block.channel(0), block.channel(1));
    }
}
