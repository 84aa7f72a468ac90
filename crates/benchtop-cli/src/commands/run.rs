//! Free-running streaming command.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use benchtop_stages::{ProcessorRegistry, linear_to_db};
use clap::Args;

use super::common::{
    Assembly, BenchArgs, assemble, print_bench, print_timings, save_settings, session_config,
    start_device,
};
use super::snapshot::{capture_window, summarize};

const TICK: Duration = Duration::from_millis(50);

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    bench: BenchArgs,

    /// Seconds between statistics reports
    #[arg(long, default_value = "1")]
    interval: f64,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    duration: Option<f64>,

    /// Take a snapshot every this many seconds, then resume streaming
    #[arg(long)]
    snapshot_every: Option<f64>,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
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

    println!("Benchtop");
    print_bench(&handle, &sources);
    println!("  Monitor:     {:+.1} dB", monitor_gain.gain_db());
    println!(
        "  Device:      {} Hz, {} frames",
        settings.device.sample_rate, settings.device.buffer_size
    );
    println!("\nPress Ctrl+C to stop...\n");

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let config = session_config(&settings.device, args.bench.device.output_only);
    let worker = start_device(bench, config, close_signal)?;
    let (inputs, outputs) = worker.channel_counts()?;
    println!("Streaming: {inputs} input / {outputs} output channel(s)\n");

    let interval = Duration::from_secs_f64(args.interval.max(0.1));
    let snapshot_every = args.snapshot_every.map(|s| Duration::from_secs_f64(s.max(0.1)));
    let stop_at = args.duration.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
    let mut last_report = Instant::now();
    let mut last_snapshot = Instant::now();
    let mut reported_errors = 0;
    let mut result: anyhow::Result<()> = Ok(());

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(TICK);
        if stop_at.is_some_and(|t| Instant::now() >= t) {
            break;
        }

        if let Some(every) = snapshot_every
            && last_snapshot.elapsed() >= every
        {
            let window = capture_window(&worker, &handle, &reader, Duration::from_secs(10), false);
            match window {
                Ok(capture) => {
                    println!("Snapshot: {}", summarize(&capture));
                    reader.recycle(capture);
                }
                Err(e) => tracing::error!(error = %e, "snapshot failed"),
            }
            if let Err(e) = worker.resume_streaming() {
                result = Err(e.into());
                break;
            }
            last_snapshot = Instant::now();
        }

        if last_report.elapsed() >= interval {
            last_report = Instant::now();
            println!(
                "Output: peak {:.1} dBFS, rms {:.1} dBFS",
                linear_to_db(reader.peak()),
                linear_to_db(reader.rms())
            );
            if let Some(capture) = reader.latest() {
                println!("  {}", summarize(&capture));
                reader.recycle(capture);
            }
            print_timings(&handle);
            println!();

            let errors = handle.stage_errors();
            if errors > reported_errors {
                tracing::warn!(
                    new = errors - reported_errors,
                    total = errors,
                    "stage failures silenced blocks"
                );
                reported_errors = errors;
            }
        }
    }

    println!("Stopping...");
    if let Err(e) = worker.close() {
        tracing::warn!(error = %e, "device did not close cleanly");
    }
    worker.shutdown();

    if !args.bench.no_save {
        save_settings(&mut settings, &handle, &settings_path)?;
    }
    result
}
