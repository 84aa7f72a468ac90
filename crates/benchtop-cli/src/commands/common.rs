//! Bench assembly shared by `run` and `snapshot`.

use std::fmt;
use std::path::PathBuf;

use benchtop_config::{BenchSettings, DeviceSettings, settings_path};
use benchtop_core::{
    Bench, BenchBuilder, BenchHandle, CloseSignal, DeviceWorker, LifecycleCall, ProcessorHandle,
    RoutingFlags, SlotId, close_channel,
};
use benchtop_io::{CpalSession, SessionConfig};
use benchtop_stages::{
    AnalyserReader, CaptureAnalyser, GainMonitor, MonitorGain, ProcessorRegistry, SignalSource,
    SourceControls, Waveform,
};
use clap::Args;

/// What feeds a source slot: a generator or the device input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceSpec {
    /// Built-in generator.
    Generator {
        /// Waveform to render.
        waveform: Waveform,
        /// Frequency in Hz, the generator default if unset.
        frequency: Option<f32>,
        /// Linear level, the generator default if unset.
        level: Option<f32>,
    },
    /// Device input, passed through.
    Input,
}

impl SourceSpec {
    /// Instantiate the source.
    pub fn build(&self) -> SignalSource {
        match *self {
            Self::Input => SignalSource::external_input(),
            Self::Generator {
                waveform,
                frequency,
                level,
            } => {
                let controls = SourceControls::default();
                if let Some(hz) = frequency {
                    controls.set_frequency(hz);
                }
                if let Some(level) = level {
                    controls.set_level(level);
                }
                SignalSource::with_controls(waveform, controls)
            }
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Generator {
                waveform,
                frequency,
                level,
            } => {
                f.write_str(waveform.label())?;
                if let Some(hz) = frequency {
                    write!(f, ":{hz}")?;
                }
                if let Some(level) = level {
                    write!(f, "@{level}")?;
                }
                Ok(())
            }
        }
    }
}

/// Parse `kind[:frequency][@level]`, e.g. `sine:1000@0.25`, `noise`, `input`.
pub fn parse_source(s: &str) -> Result<SourceSpec, String> {
    let (rest, level) = match s.split_once('@') {
        Some((rest, level)) => {
            let level: f32 = level
                .parse()
                .map_err(|_| format!("Invalid source level: '{level}'"))?;
            if !(0.0..=1.0).contains(&level) {
                return Err(format!("Source level {level} outside 0..1"));
            }
            (rest, Some(level))
        }
        None => (s, None),
    };
    let (kind, frequency) = match rest.split_once(':') {
        Some((kind, hz)) => {
            let hz: f32 = hz
                .parse()
                .map_err(|_| format!("Invalid source frequency: '{hz}'"))?;
            if !hz.is_finite() || hz < 0.0 {
                return Err(format!("Source frequency must be >= 0, got {hz}"));
            }
            (kind, Some(hz))
        }
        None => (rest, None),
    };

    if kind.eq_ignore_ascii_case("input") {
        if frequency.is_some() || level.is_some() {
            return Err("The input source takes no frequency or level".to_string());
        }
        return Ok(SourceSpec::Input);
    }
    let waveform = Waveform::from_label(kind).ok_or_else(|| {
        format!("Unknown source '{kind}' (expected sine, noise, impulse, silence or input)")
    })?;
    Ok(SourceSpec::Generator {
        waveform,
        frequency,
        level,
    })
}

/// Parse comma-separated routing tokens: `a`, `b`, `inv`, `mute`, `off`.
///
/// An empty list or `none` connects neither source.
pub fn parse_routing(s: &str) -> Result<RoutingFlags, String> {
    let mut flags = RoutingFlags {
        source_a: false,
        ..RoutingFlags::default()
    };
    for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.to_ascii_lowercase().as_str() {
            "a" => flags.source_a = true,
            "b" => flags.source_b = true,
            "inv" | "invert" => flags.inverted = true,
            "mute" => flags.muted = true,
            "off" => flags.enabled = false,
            "none" => {}
            other => return Err(format!("Unknown routing token: '{other}'")),
        }
    }
    Ok(flags)
}

/// Parse `control=value`, the control given by name or index and the value
/// normalized to `0..1`.
pub fn parse_control(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid control format: '{s}' (expected name=value)"))?;
    let value: f64 = value
        .parse()
        .map_err(|_| format!("Invalid control value: '{value}'"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("Control value {value} outside 0..1"));
    }
    Ok((key.trim().to_string(), value))
}

/// Device flags. Unset values come from the saved settings.
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Input device name (partial, case-insensitive)
    #[arg(long)]
    pub input_device: Option<String>,

    /// Output device name (partial, case-insensitive)
    #[arg(long)]
    pub output_device: Option<String>,

    /// Sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Block size in frames
    #[arg(long)]
    pub buffer_size: Option<u32>,

    /// Do not open an input stream
    #[arg(long)]
    pub output_only: bool,
}

impl DeviceArgs {
    /// Saved device settings overridden by the flags given.
    pub fn resolve(&self, saved: &DeviceSettings) -> DeviceSettings {
        DeviceSettings {
            input_device: self.input_device.clone().or_else(|| saved.input_device.clone()),
            output_device: self
                .output_device
                .clone()
                .or_else(|| saved.output_device.clone()),
            sample_rate: self.sample_rate.unwrap_or(saved.sample_rate),
            buffer_size: self.buffer_size.unwrap_or(saved.buffer_size),
        }
    }
}

/// Bench composition flags shared by `run` and `snapshot`.
#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    /// Processor in slot A (id or name, see `benchtop processors`)
    #[arg(long)]
    pub proc_a: Option<String>,

    /// Processor in slot B
    #[arg(long)]
    pub proc_b: Option<String>,

    /// Source A: sine[:hz][@level], noise, impulse[:hz], silence, input
    #[arg(long, default_value = "sine:440", value_parser = parse_source)]
    pub source_a: SourceSpec,

    /// Source B
    #[arg(long, default_value = "silence", value_parser = parse_source)]
    pub source_b: SourceSpec,

    /// Routing of slot A, e.g. "a", "a,b,inv", "b,mute", "off"
    #[arg(long, value_parser = parse_routing)]
    pub route_a: Option<RoutingFlags>,

    /// Routing of slot B
    #[arg(long, value_parser = parse_routing)]
    pub route_b: Option<RoutingFlags>,

    /// Normalized control of slot A (e.g. "Gain=0.75" or "0=0.75")
    #[arg(long = "control-a", value_parser = parse_control, number_of_values = 1)]
    pub control_a: Vec<(String, f64)>,

    /// Normalized control of slot B
    #[arg(long = "control-b", value_parser = parse_control, number_of_values = 1)]
    pub control_b: Vec<(String, f64)>,

    /// Monitor gain in dB
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub monitor_gain: f32,

    /// Snapshot hold size in samples
    #[arg(long)]
    pub hold_size: Option<u32>,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Do not write settings back on exit
    #[arg(long)]
    pub no_save: bool,

    #[command(flatten)]
    pub device: DeviceArgs,
}

impl BenchArgs {
    fn processor_key(&self, id: SlotId) -> Option<&str> {
        match id {
            SlotId::A => self.proc_a.as_deref(),
            SlotId::B => self.proc_b.as_deref(),
        }
    }

    fn routing(&self, id: SlotId) -> Option<RoutingFlags> {
        match id {
            SlotId::A => self.route_a,
            SlotId::B => self.route_b,
        }
    }

    fn controls(&self, id: SlotId) -> &[(String, f64)] {
        match id {
            SlotId::A => &self.control_a,
            SlotId::B => &self.control_b,
        }
    }
}

/// A bench ready to be handed to a device, with everything the command
/// needs to observe it.
pub struct Assembly {
    /// The bench, closed.
    pub bench: Bench,
    /// Close requests raised by the bench when a hold expires.
    pub close_signal: CloseSignal,
    /// Capture frames and meters of the analyser.
    pub reader: AnalyserReader,
    /// Monitor gain.
    pub monitor_gain: MonitorGain,
    /// Settings as loaded, with the device section already resolved.
    pub settings: BenchSettings,
    /// Where the settings are written back.
    pub settings_path: PathBuf,
    /// Source descriptions for display.
    pub sources: [SourceSpec; 2],
}

/// Map the persisted device blob onto a cpal session configuration.
pub fn session_config(device: &DeviceSettings, output_only: bool) -> SessionConfig {
    SessionConfig {
        input_device: device.input_device.clone(),
        output_device: device.output_device.clone(),
        sample_rate: device.sample_rate,
        buffer_size: device.buffer_size,
        output_only,
    }
}

/// Load settings and build the bench the flags describe.
///
/// Saved slot state is restored onto a slot only when it holds the same
/// processor; explicit routing and control flags are applied on top.
pub fn assemble(args: &BenchArgs, registry: &ProcessorRegistry) -> anyhow::Result<Assembly> {
    let settings_path = args.settings.clone().unwrap_or_else(settings_path);
    let mut settings = BenchSettings::load_or_default(&settings_path)?;
    settings.device = args.device.resolve(&settings.device);
    if let Some(hold_size) = args.hold_size {
        settings.hold_size = hold_size;
    }
    if settings.device.buffer_size == 0 {
        anyhow::bail!("Buffer size must be at least one frame");
    }

    let (analyser, reader) = CaptureAnalyser::new();
    let monitor = GainMonitor::new();
    monitor.gain().set_gain_db(args.monitor_gain);
    let monitor_gain = monitor.gain().clone();

    let sources = [args.source_a, args.source_b];
    let mut builder = BenchBuilder::new(
        Box::new(sources[0].build()),
        Box::new(sources[1].build()),
        Box::new(analyser),
        Box::new(monitor),
    )
    .hold_size(settings.hold_size);

    for id in SlotId::ALL {
        let saved = &settings.slot(id).processor;
        let key = args
            .processor_key(id)
            .or_else(|| (!saved.is_empty()).then_some(saved.as_str()))
            .unwrap_or("thru");
        let processor = registry
            .create_by_id_or_name(key)
            .ok_or_else(|| anyhow::anyhow!("Unknown processor: {key}"))?;
        builder = builder.processor(id, processor);
    }

    let (requester, close_signal) = close_channel();
    let bench = builder.build(requester);

    for id in SlotId::ALL {
        let handle = bench.handle().processor(id);
        if settings.slot(id).apply_to(handle) {
            tracing::debug!(slot = id.label(), processor = handle.name(), "slot restored");
        }
        if let Some(flags) = args.routing(id) {
            handle.routing().store(flags);
        }
        for (key, value) in args.controls(id) {
            let index = control_index(handle, key)?;
            handle.set_control_value(index, *value);
        }
    }

    Ok(Assembly {
        bench,
        close_signal,
        reader,
        monitor_gain,
        settings,
        settings_path,
        sources,
    })
}

fn control_index(handle: &ProcessorHandle, key: &str) -> anyhow::Result<usize> {
    if let Ok(index) = key.parse::<usize>() {
        if index < handle.num_controls() {
            return Ok(index);
        }
    } else if let Some(index) =
        (0..handle.num_controls()).find(|&i| handle.control_name(i).eq_ignore_ascii_case(key))
    {
        return Ok(index);
    }
    anyhow::bail!("{} has no control '{}'", handle.name(), key)
}

/// Spawn the device worker and open the device on it.
pub fn start_device(
    bench: Bench,
    config: SessionConfig,
    close_signal: CloseSignal,
) -> anyhow::Result<DeviceWorker> {
    let controller = bench.handle().snapshot_controller();
    let worker = DeviceWorker::spawn(
        move || CpalSession::open(config, bench),
        controller,
        close_signal,
    )?;
    Ok(worker)
}

/// Write the slot state of `handle` and the resolved settings back to disk.
pub fn save_settings(
    settings: &mut BenchSettings,
    handle: &BenchHandle,
    path: &std::path::Path,
) -> anyhow::Result<()> {
    settings.capture_slots([handle.processor(SlotId::A), handle.processor(SlotId::B)]);
    settings.hold_size = handle.hold().configured_size();
    settings.save(path)?;
    Ok(())
}

/// Print the slot composition.
pub fn print_bench(handle: &BenchHandle, sources: &[SourceSpec; 2]) {
    for (id, source) in SlotId::ALL.into_iter().zip(sources) {
        println!("  Source {}:    {}", id.label(), source);
    }
    for id in SlotId::ALL {
        let slot = handle.processor(id);
        let flags = slot.routing().load();
        println!(
            "  Processor {}: {} [{}]",
            id.label(),
            slot.name(),
            describe_routing(flags)
        );
        for index in 0..slot.num_controls() {
            println!(
                "      {:12} {:.3}",
                slot.control_name(index),
                slot.control_value(index)
            );
        }
    }
}

/// Compact routing description, the inverse of [`parse_routing`].
pub fn describe_routing(flags: RoutingFlags) -> String {
    let mut tokens = Vec::new();
    if flags.source_a {
        tokens.push("a");
    }
    if flags.source_b {
        tokens.push("b");
    }
    if tokens.is_empty() {
        tokens.push("none");
    }
    if flags.inverted {
        tokens.push("inv");
    }
    if flags.muted {
        tokens.push("mute");
    }
    if !flags.enabled {
        tokens.push("off");
    }
    tokens.join(",")
}

/// Print process-call timing of every stage.
#[allow(clippy::print_literal)]
pub fn print_timings(handle: &BenchHandle) {
    println!(
        "  {:14}  {:>10}  {:>10}  {:>10}  {:>8}",
        "Stage", "avg ms", "min ms", "max ms", "blocks"
    );
    for (label, timings) in handle.stage_timings() {
        let process = timings.snapshot(LifecycleCall::Process);
        println!(
            "  {:14}  {:>10.4}  {:>10.4}  {:>10.4}  {:>8}",
            label.to_string(),
            process.average_ms,
            process.min_ms,
            process.max_ms,
            process.num_samples
        );
    }
}
