//! Property-based tests for benchtop-stages.
//!
//! Output bounds of sources and monitor, stability of the equalizer across
//! its whole control range, and reproducibility of rewound sources.

use benchtop_core::{AudioBlock, ControlBank, Lifecycle, ProcessSpec, Processor, Source, Stage};
use benchtop_stages::{GainMonitor, ParametricEq, SignalSource, Waveform};
use proptest::prelude::*;

fn waveform() -> impl Strategy<Value = Waveform> {
    prop::sample::select(Waveform::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Generated samples never exceed the source level.
    #[test]
    fn source_output_bounded_by_level(
        waveform in waveform(),
        frequency in 0.0f32..24_000.0,
        level in 0.0f32..=1.0,
        frames in 1usize..2048,
    ) {
        let mut source = SignalSource::new(waveform);
        source.controls().set_frequency(frequency);
        source.controls().set_level(level);
        source.prepare(&ProcessSpec::new(48000.0, frames as u32, 1)).unwrap();
        let mut samples = vec![0.0f32; frames];
        source.process(&mut AudioBlock::from_mono(&mut samples)).unwrap();
        for s in samples {
            prop_assert!(s.is_finite());
            prop_assert!(s.abs() <= level + 1e-6, "sample {} level {}", s, level);
        }
    }

    /// A rewound source repeats its output regardless of block split.
    #[test]
    fn rewind_is_block_size_independent(
        waveform in waveform(),
        frequency in 20.0f32..10_000.0,
        split in 1usize..511,
    ) {
        let mut source = SignalSource::new(waveform);
        source.controls().set_frequency(frequency);
        source.prepare(&ProcessSpec::new(48000.0, 512, 1)).unwrap();

        let mut whole = vec![0.0f32; 512];
        source.process(&mut AudioBlock::from_mono(&mut whole)).unwrap();

        source.restore_for_snapshot();
        let mut parts = vec![0.0f32; 512];
        let (head, tail) = parts.split_at_mut(split);
        source.process(&mut AudioBlock::from_mono(head)).unwrap();
        source.process(&mut AudioBlock::from_mono(tail)).unwrap();

        prop_assert_eq!(whole, parts);
    }

    /// The monitor output is always finite and within [-1, 1].
    #[test]
    fn monitor_output_is_safe(
        input in prop::collection::vec(prop::num::f32::ANY, 1..256),
        gain_db in -100.0f32..40.0,
    ) {
        let mut monitor = GainMonitor::new();
        monitor.gain().set_gain_db(gain_db);
        let mut samples = input;
        monitor.process(&mut AudioBlock::from_mono(&mut samples)).unwrap();
        for s in samples {
            prop_assert!(s.is_finite() && (-1.0..=1.0).contains(&s));
        }
    }

    /// The equalizer stays stable for any control setting.
    #[test]
    fn equalizer_is_stable(
        frequency in 0.0f64..=1.0,
        gain in 0.0f64..=1.0,
    ) {
        let mut eq = ParametricEq::new();
        let controls = ControlBank::from_specs(eq.controls());
        controls.set(ParametricEq::FREQUENCY, frequency);
        controls.set(ParametricEq::GAIN, gain);
        eq.prepare(&ProcessSpec::new(48000.0, 48000, 1)).unwrap();

        let mut samples = vec![0.0f32; 48000];
        samples[0] = 1.0;
        eq.process(&mut AudioBlock::from_mono(&mut samples), &controls).unwrap();
        let tail = samples[44000..].iter().fold(0.0_f32, |p, s| p.max(s.abs()));
        prop_assert!(tail < 1e-3, "impulse response tail {}", tail);
    }
}
