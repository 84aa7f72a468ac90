//! Processor listing command.

#![allow(clippy::print_literal)] // Table headers use literal strings

use benchtop_stages::{ProcessorDescriptor, ProcessorRegistry};
use clap::Args;

#[derive(Args)]
pub struct ProcessorsArgs {
    /// Show details for a specific processor
    #[arg(value_name = "PROCESSOR")]
    processor: Option<String>,
}

fn find<'a>(registry: &'a ProcessorRegistry, key: &str) -> Option<&'a ProcessorDescriptor> {
    registry.get(key).or_else(|| {
        registry
            .all_processors()
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(key))
    })
}

pub fn run(args: ProcessorsArgs) -> anyhow::Result<()> {
    let registry = ProcessorRegistry::new();

    if let Some(key) = &args.processor {
        let descriptor =
            find(&registry, key).ok_or_else(|| anyhow::anyhow!("Unknown processor: {}", key))?;

        println!("{} ({})", descriptor.name, descriptor.id);
        println!("{}", "=".repeat(descriptor.name.len() + descriptor.id.len() + 3));
        println!();
        println!("{}", descriptor.description);
        println!();

        if descriptor.controls.is_empty() {
            println!("No controls.");
            return Ok(());
        }

        println!("Controls:");
        println!();
        println!(
            "  {:5}  {:12}  {:>10}  {:>10}  {:>8}",
            "Index", "Name", "Low", "High", "Default"
        );
        println!(
            "  {:5}  {:12}  {:>10}  {:>10}  {:>8}",
            "-----", "----", "---", "----", "-------"
        );
        for (index, control) in descriptor.controls.iter().enumerate() {
            println!(
                "  {:5}  {:12}  {:>10}  {:>10}  {:>8.3}",
                index, control.name, control.range.low, control.range.high, control.default
            );
        }
        println!();
        println!("Controls are set as normalized 0..1 values:");
        println!(
            "  benchtop run --proc-a {} --control-a {}={:.2}",
            descriptor.id, descriptor.controls[0].name, descriptor.controls[0].default
        );
        return Ok(());
    }

    println!("Available Processors");
    println!("====================\n");
    println!("  {:8}  {:8}  {:9}  {}", "ID", "Name", "Controls", "Description");
    println!("  {:8}  {:8}  {:9}  {}", "--", "----", "--------", "-----------");
    for descriptor in registry.all_processors() {
        println!(
            "  {:8}  {:8}  {:9}  {}",
            descriptor.id,
            descriptor.name,
            descriptor.controls.len(),
            descriptor.description
        );
    }
    println!();
    println!("Use 'benchtop processors <id>' for control details.");

    Ok(())
}
