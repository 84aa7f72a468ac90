//! Deterministic capture command.

use std::time::{Duration, Instant};

use benchtop_core::{BenchHandle, DeviceWorker, HoldPhase, LifecycleCall, TimingSnapshot};
use benchtop_stages::{AnalyserReader, Capture, ProcessorRegistry, linear_to_db};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::common::{
    Assembly, BenchArgs, assemble, print_bench, print_timings, save_settings, session_config,
    start_device,
};

/// How often the hold counter is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    bench: BenchArgs,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Free-running time before the capture starts, in milliseconds
    #[arg(long, default_value = "200")]
    settle_ms: u64,

    /// Give up when the hold has not expired after this many seconds
    #[arg(long, default_value = "10")]
    timeout: f64,
}

/// Take a snapshot on a streaming device and wait for its capture.
///
/// Returns once the hold has expired and the analyser delivered the frame.
pub fn capture_window(
    worker: &DeviceWorker,
    handle: &BenchHandle,
    reader: &AnalyserReader,
    timeout: Duration,
    progress: bool,
) -> anyhow::Result<Capture> {
    let hold = handle.hold();
    reader.discard_pending();
    handle.reset_statistics();
    worker.take_snapshot()?;

    let total = u64::from(hold.hold_size().max(hold.configured_size()));
    let pb = if progress {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples")?
                .progress_chars("##-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let started = Instant::now();
    while hold.phase() != HoldPhase::Expired {
        if started.elapsed() > timeout {
            pb.abandon();
            anyhow::bail!(
                "Hold did not expire within {:.1} s ({} of {} samples)",
                timeout.as_secs_f64(),
                hold.sample_counter(),
                hold.hold_size()
            );
        }
        pb.set_position(hold.sample_counter().min(total));
        std::thread::sleep(POLL_INTERVAL);
    }
    pb.set_position(total);
    pb.finish_and_clear();

    loop {
        if let Some(capture) = reader.latest() {
            return Ok(capture);
        }
        if started.elapsed() > timeout {
            anyhow::bail!("Hold expired but no capture frame was delivered");
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// One-line level and spectrum summary of a capture.
pub fn summarize(capture: &Capture) -> String {
    let spectrum = capture.spectrum();
    let dominant = spectrum
        .dominant_frequency()
        .map_or_else(|| "-".to_string(), |hz| format!("{hz:.1} Hz"));
    format!(
        "peak {:.1} dBFS, rms {:.1} dBFS, dominant {}",
        linear_to_db(capture.peak()),
        linear_to_db(capture.rms()),
        dominant
    )
}

fn timing_json(snapshot: TimingSnapshot) -> serde_json::Value {
    serde_json::json!({
        "average_ms": snapshot.average_ms,
        "min_ms": snapshot.min_ms,
        "max_ms": snapshot.max_ms,
        "num_samples": snapshot.num_samples,
    })
}

fn report_json(capture: &Capture, handle: &BenchHandle, monitor_gain_db: f32) -> serde_json::Value {
    let spectrum = capture.spectrum();
    let peak_bin = spectrum.peak_bin();
    let stages: Vec<_> = handle
        .stage_timings()
        .into_iter()
        .map(|(label, timings)| {
            serde_json::json!({
                "stage": label.to_string(),
                "prepare": timing_json(timings.snapshot(LifecycleCall::Prepare)),
                "process": timing_json(timings.snapshot(LifecycleCall::Process)),
                "reset": timing_json(timings.snapshot(LifecycleCall::Reset)),
            })
        })
        .collect();

    serde_json::json!({
        "sample_rate": capture.sample_rate(),
        "hold_size": handle.hold().hold_size(),
        "samples": capture.samples().len(),
        "peak": capture.peak(),
        "peak_dbfs": linear_to_db(capture.peak()),
        "rms": capture.rms(),
        "rms_dbfs": linear_to_db(capture.rms()),
        "dominant_frequency_hz": spectrum.dominant_frequency(),
        "peak_bin": peak_bin.map(|(bin, _)| bin),
        "peak_bin_magnitude": peak_bin.map(|(_, magnitude)| magnitude),
        "bin_width_hz": spectrum.bin_width(),
        "stage_errors": handle.stage_errors(),
        "monitor_gain_db": monitor_gain_db,
        "stages": stages,
    })
}

pub fn run(args: SnapshotArgs) -> anyhow::Result<()> {
    let registry = ProcessorRegistry::new();
    let Assembly {
        bench,
        close_signal,
        reader,
        monitor_gain,
        mut settings,
        settings_path,
        sources,
    } = assemble(&args.bench, &registry)?;
    let handle = bench.handle().clone();

    if !args.json {
        println!("Snapshot of {} samples", handle.hold().configured_size());
        print_bench(&handle, &sources);
        println!();
    }

    let config = session_config(&settings.device, args.bench.device.output_only);
    let worker = start_device(bench, config, close_signal)?;
    std::thread::sleep(Duration::from_millis(args.settle_ms));

    let timeout = Duration::from_secs_f64(args.timeout.max(0.0));
    let capture = capture_window(&worker, &handle, &reader, timeout, !args.json);
    worker.shutdown();
    let capture = capture?;

    if args.json {
        let report = report_json(&capture, &handle, monitor_gain.gain_db());
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Capture: {} samples at {} Hz", capture.samples().len(), capture.sample_rate());
        println!("  {}", summarize(&capture));
        if let Some((bin, magnitude)) = capture.spectrum().peak_bin() {
            println!("  Peak bin {bin}, magnitude {magnitude:.4}");
        }
        let errors = handle.stage_errors();
        if errors > 0 {
            println!("  Silenced blocks: {errors}");
        }
        println!();
        print_timings(&handle);
    }

    if !args.bench.no_save {
        save_settings(&mut settings, &handle, &settings_path)?;
    }
    Ok(())
}
