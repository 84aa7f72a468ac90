//! Benchtop CLI - drive the DSP test bench from the command line.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "benchtop")]
#[command(author, version, about = "Realtime DSP test bench", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List and inspect audio devices
    Devices(commands::devices::DevicesArgs),

    /// List the processors that can be put into a slot
    Processors(commands::processors::ProcessorsArgs),

    /// Stream through the bench until Ctrl+C
    Run(commands::run::RunArgs),

    /// Capture one deterministic hold window and report on it
    Snapshot(commands::snapshot::SnapshotArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Processors(args) => commands::processors::run(args),
        Commands::Run(args) => commands::run::run(args),
        Commands::Snapshot(args) => commands::snapshot::run(args),
    }
}
