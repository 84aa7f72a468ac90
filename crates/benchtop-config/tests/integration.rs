//! Integration tests for benchtop-config.
//!
//! Settings files on disk and slot capture / restore against live
//! processor slots.

use benchtop_config::{BenchSettings, ConfigError, SlotSettings};
use benchtop_core::{
    AudioBlock, ControlBank, ControlRange, ControlSpec, ProcessSpec, Processor, ProcessorSlot,
    RoutingFlags, SlotId, StageResult,
};
use tempfile::TempDir;

struct Tone;

impl Processor for Tone {
    fn prepare(&mut self, _spec: &ProcessSpec) -> StageResult {
        Ok(())
    }

    fn process(&mut self, _block: &mut AudioBlock<'_>, _controls: &ControlBank) -> StageResult {
        Ok(())
    }

    fn reset(&mut self) -> StageResult {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Tone"
    }

    fn controls(&self) -> &'static [ControlSpec] {
        const CONTROLS: &[ControlSpec] = &[
            ControlSpec::new("Bass", 0.5, ControlRange::new(-12.0, 12.0)),
            ControlSpec::new("Treble", 0.5, ControlRange::new(-12.0, 12.0)),
        ];
        CONTROLS
    }
}

#[test]
fn test_save_and_load_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    let mut settings = BenchSettings::default();
    settings.hold_size = 2048;
    settings.device.output_device = Some("Monitor".into());
    settings.device.buffer_size = 128;
    settings.slot_mut(SlotId::A).processor = "PEQ".into();
    settings.slot_mut(SlotId::A).controls = vec![0.1, 0.9];

    settings.save(&path).unwrap();
    assert!(path.exists());

    let loaded = BenchSettings::load(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let settings = BenchSettings::load_or_default(&path).unwrap();
    assert_eq!(settings, BenchSettings::default());
    assert!(!path.exists());

    assert!(matches!(
        BenchSettings::load(&path),
        Err(ConfigError::ReadFile { .. })
    ));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "hold_size = \"lots\"\n").unwrap();

    assert!(matches!(
        BenchSettings::load_or_default(&path),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn test_capture_and_restore_slot() {
    let slot = ProcessorSlot::with_routing(
        Box::new(Tone),
        RoutingFlags {
            source_b: true,
            inverted: true,
            ..RoutingFlags::default()
        },
    );
    slot.handle().set_control_value(1, 0.8);

    let saved = SlotSettings::capture(slot.handle());
    assert_eq!(saved.processor, "Tone");
    assert_eq!(saved.controls, vec![0.5, 0.8]);
    assert!(saved.source_b && saved.inverted);

    let fresh = ProcessorSlot::new(Box::new(Tone));
    assert!(saved.apply_to(fresh.handle()));
    assert_eq!(fresh.handle().control_value(1), 0.8);
    assert_eq!(fresh.handle().routing().load(), saved.routing());
}

#[test]
fn test_restore_skips_other_processor() {
    let mut saved = SlotSettings::default();
    saved.processor = "PEQ".into();
    saved.enabled = false;
    saved.controls = vec![0.0, 0.0];

    let slot = ProcessorSlot::new(Box::new(Tone));
    assert!(!saved.apply_to(slot.handle()));
    assert!(slot.handle().routing().load().enabled);
    assert_eq!(slot.handle().control_values(), vec![0.5, 0.5]);
}

#[test]
fn test_surplus_controls_are_ignored() {
    let saved = SlotSettings {
        processor: "Tone".into(),
        controls: vec![0.2, 0.3, 0.4, 0.5],
        ..SlotSettings::default()
    };
    let slot = ProcessorSlot::new(Box::new(Tone));
    assert!(saved.apply_to(slot.handle()));
    assert_eq!(slot.handle().control_values(), vec![0.2, 0.3]);
}

#[test]
fn test_capture_slots_records_both() {
    let a = ProcessorSlot::new(Box::new(Tone));
    let b = ProcessorSlot::pass_through();
    b.handle().routing().set_muted(true);

    let mut settings = BenchSettings::default();
    settings.capture_slots([a.handle(), b.handle()]);

    assert_eq!(settings.slot(SlotId::A).processor, "Tone");
    assert_eq!(settings.slot(SlotId::B).processor, "Thru");
    assert!(settings.slot(SlotId::B).muted);
    assert!(settings.slot(SlotId::B).controls.is_empty());
}
