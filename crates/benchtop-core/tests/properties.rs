//! Property-based tests for benchtop-core.
//!
//! Routing and combine correctness over random buffers and flags, timing
//! statistic bounds over random durations, and hold expiry over random hold
//! and block sizes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use benchtop_core::{
    AudioBlock, AudioBuffer, HoldState, LifecycleCall, RoutingFlags, SignalRouter, SlotId,
    StageTimings, TimedStage, TimingStatistics, mix_slot_input,
};
use common::{ConstSource, Constant, build, builder, spec};

fn fill_mono(buffer: &mut AudioBuffer, samples: &[f32]) {
    buffer.set_len(samples.len());
    buffer.block().channel_mut(0).copy_from_slice(samples);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The slot input is A+B, A, B or silence depending on which sources
    /// are connected.
    #[test]
    fn slot_input_follows_source_flags(
        a in prop::collection::vec(-1.0f32..=1.0f32, 1..256),
        b_seed in -1.0f32..=1.0f32,
        source_a in any::<bool>(),
        source_b in any::<bool>(),
    ) {
        let b: Vec<f32> = (0..a.len()).map(|i| b_seed * (i as f32 * 0.01).cos()).collect();
        let mut buf_a = AudioBuffer::new(1, a.len());
        let mut buf_b = AudioBuffer::new(1, a.len());
        let mut buf_dest = AudioBuffer::new(1, a.len());
        fill_mono(&mut buf_a, &a);
        fill_mono(&mut buf_b, &b);
        buf_dest.block().fill(7.0);

        let flags = RoutingFlags { source_a, source_b, ..RoutingFlags::default() };
        let block_a = buf_a.block();
        let block_b = buf_b.block();
        let mut dest = buf_dest.block();
        mix_slot_input(flags, &block_a, &block_b, &mut dest);

        for (i, &out) in dest.channel(0).iter().enumerate() {
            let expected = match (source_a, source_b) {
                (true, true) => a[i] + b[i],
                (true, false) => a[i],
                (false, true) => b[i],
                (false, false) => 0.0,
            };
            prop_assert_eq!(out, expected);
        }
    }

    /// Enabled slots combine by addition, each inverted by its own flag; no
    /// enabled slot gives silence.
    #[test]
    fn enabled_slots_combine_by_sum(
        level_a in -4.0f64..=4.0,
        level_b in -4.0f64..=4.0,
        enabled_a in any::<bool>(),
        enabled_b in any::<bool>(),
        inverted_a in any::<bool>(),
        inverted_b in any::<bool>(),
    ) {
        let (builder, _) = builder(0.0, 0.0);
        let (mut bench, _signal) = build(
            builder
                .processor(SlotId::A, Box::new(Constant))
                .processor(SlotId::B, Box::new(Constant))
                .routing(SlotId::A, RoutingFlags { enabled: enabled_a, inverted: inverted_a, ..RoutingFlags::default() })
                .routing(SlotId::B, RoutingFlags { enabled: enabled_b, inverted: inverted_b, ..RoutingFlags::default() }),
        );
        let handle = bench.handle().clone();
        handle.processor(SlotId::A).set_control_value(0, Constant::normalized(level_a));
        handle.processor(SlotId::B).set_control_value(0, Constant::normalized(level_b));
        bench.prepare(&spec()).unwrap();

        let mut io = AudioBuffer::for_spec(&spec());
        let mut block = io.block();
        bench.process_block(&mut block).unwrap();

        let slot = |enabled: bool, inverted: bool, level: f64| -> f32 {
            if !enabled {
                return 0.0;
            }
            let normalized = Constant::normalized(level);
            let value = (-4.0 + 8.0 * normalized) as f32;
            if inverted { -value } else { value }
        };
        let expected = slot(enabled_a, inverted_a, level_a) + slot(enabled_b, inverted_b, level_b);
        for ch in 0..block.num_channels() {
            for &s in block.channel(ch) {
                prop_assert!((s - expected).abs() < 1e-5, "got {} expected {}", s, expected);
            }
        }
    }

    /// Every recorded duration lies within [min, max] and count matches the
    /// number of records; after a reset one record pins both bounds.
    #[test]
    fn timing_bounds_hold(
        durations in prop::collection::vec(0.0f64..50.0, 1..200),
        after_reset in 0.0f64..50.0,
    ) {
        let stats = TimingStatistics::new();
        for &d in &durations {
            stats.record(d);
        }
        for &d in &durations {
            prop_assert!(stats.min() <= d && d <= stats.max());
        }
        prop_assert_eq!(stats.count(), durations.len() as f64);
        let mean = durations.iter().sum::<f64>() / durations.len() as f64;
        prop_assert!((stats.average() - mean).abs() < 1e-9);

        stats.reset();
        stats.record(after_reset);
        prop_assert_eq!(stats.min(), after_reset);
        prop_assert_eq!(stats.max(), after_reset);
        prop_assert_eq!(stats.count(), 1.0);
    }

    /// A timed stage records exactly one process sample per call.
    #[test]
    fn timed_stage_counts_calls(calls in 1usize..64) {
        let timings = Arc::new(StageTimings::new());
        let mut stage = TimedStage::with_timings(ConstSource::new(0.5), Arc::clone(&timings));
        let mut data = vec![0.0f32; 32];
        let mut block = AudioBlock::from_mono(&mut data);
        for _ in 0..calls {
            stage.process(&mut block).unwrap();
        }
        prop_assert_eq!(timings.duration_num_samples(LifecycleCall::Process), calls as f64);
        prop_assert!(timings.duration_min(LifecycleCall::Process) <= timings.duration_average(LifecycleCall::Process) + 1e-12);
        prop_assert!(timings.duration_average(LifecycleCall::Process) <= timings.duration_max(LifecycleCall::Process) + 1e-12);

        timings.record(LifecycleCall::Reset, Duration::from_micros(250));
        prop_assert_eq!(timings.duration_min(LifecycleCall::Reset), timings.duration_max(LifecycleCall::Reset));
    }

    /// With hold size S and block size B the hold fires on block
    /// ceil((S + 1) / B), and only then.
    #[test]
    fn hold_fires_on_first_block_past_hold_size(
        hold_size in 0u32..20_000,
        block_size in 1usize..2048,
    ) {
        let hold = HoldState::new(hold_size);
        hold.arm();
        let expected = (hold_size as usize + 1).div_ceil(block_size);
        let mut fired_at = None;
        for block in 1..=expected + 3 {
            if hold.advance(block_size) {
                prop_assert!(fired_at.is_none());
                fired_at = Some(block);
            }
        }
        prop_assert_eq!(fired_at, Some(expected));
    }
}

#[test]
fn router_default_is_two_pass_through_slots() {
    let router = SignalRouter::default();
    for id in SlotId::ALL {
        assert_eq!(router.slot(id).handle().name(), "Thru");
        assert_eq!(router.slot(id).handle().num_controls(), 0);
    }
}
