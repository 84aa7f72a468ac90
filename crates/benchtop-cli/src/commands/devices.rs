//! Audio device listing command.

#![allow(clippy::print_literal)] // Table headers use literal strings

use benchtop_io::{AudioDevice, default_device, list_devices};
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    command: Option<DevicesCommand>,
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List all available audio devices
    List,

    /// Show default device information
    Info,
}

fn channels(device: &AudioDevice) -> String {
    match (device.input_channels, device.output_channels) {
        (0, out) => format!("{out} out"),
        (inp, 0) => format!("{inp} in"),
        (inp, out) => format!("{inp} in / {out} out"),
    }
}

fn describe_default(kind: &str, device: Option<&AudioDevice>, count: impl Fn(&AudioDevice) -> u16) {
    let Some(device) = device else {
        println!("Default {kind}: none");
        return;
    };
    println!("Default {kind}: {}", device.name);
    println!("  {} channel(s) at {} Hz", count(device), device.default_sample_rate);
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    match args.command.unwrap_or(DevicesCommand::List) {
        DevicesCommand::List => {
            let devices = list_devices()?;
            if devices.is_empty() {
                println!("No audio devices found.");
                return Ok(());
            }

            let (default_input, default_output) = default_device()?;
            let is_default = |device: &AudioDevice, default: Option<&AudioDevice>| {
                default.is_some_and(|d| d.name == device.name)
            };

            println!("  {:40}  {:>14}  {:>8}  {}", "Device", "Channels", "Rate", "Default");
            println!("  {:40}  {:>14}  {:>8}  {}", "------", "--------", "----", "-------");
            for device in &devices {
                let mut defaults = Vec::new();
                if is_default(device, default_input.as_ref()) {
                    defaults.push("input");
                }
                if is_default(device, default_output.as_ref()) {
                    defaults.push("output");
                }
                println!(
                    "  {:40}  {:>14}  {:>8}  {}",
                    device.name,
                    channels(device),
                    device.default_sample_rate,
                    defaults.join(", ")
                );
            }

            let inputs = devices.iter().filter(|d| d.is_input()).count();
            let outputs = devices.iter().filter(|d| d.is_output()).count();
            println!();
            println!("{} device(s): {inputs} with input, {outputs} with output", devices.len());
            println!("Select by partial name: benchtop run --output-device \"USB\"");
        }

        DevicesCommand::Info => {
            let (input, output) = default_device()?;
            describe_default("input", input.as_ref(), |d| d.input_channels);
            println!();
            describe_default("output", output.as_ref(), |d| d.output_channels);
        }
    }

    Ok(())
}
