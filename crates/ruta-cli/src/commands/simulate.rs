//! Scenario simulation command.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;

use super::common::load_config;
use crate::scenario::{Outcome, Report, Scenario};

#[derive(Args)]
pub struct SimulateArgs {
    /// Scenario file (TOML)
    scenario: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Include every driver and session call in the report
    #[arg(long)]
    journal: bool,
}

pub fn run(args: SimulateArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading {}", args.scenario.display()))?;
    let scenario = Scenario::from_toml(&content)
        .with_context(|| format!("in {}", args.scenario.display()))?;
    let config = if scenario.config.is_some() {
        ruta_config::RutaConfig::default()
    } else {
        load_config(config)?
    };

    let report = scenario.run(config, args.journal)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} expectation(s) failed");
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!("Steps");
    println!("=====");
    for step in &report.steps {
        let outcome = match &step.outcome {
            Outcome::Ok => "ok".to_string(),
            Outcome::Passed => "passed".to_string(),
            Outcome::Error(e) => format!("error: {e}"),
            Outcome::Failed(e) => format!("FAILED: {e}"),
        };
        println!("  {:>3}. {:40} {}", step.index, step.step, outcome);
    }

    println!("\nStreams");
    println!("=======");
    for stream in &report.streams {
        let devices: Vec<&str> = stream.devices.iter().map(|d| d.name()).collect();
        println!(
            "  {:16} {:10} {:12} {:12} [{}]",
            stream.name,
            stream.id.to_string(),
            stream.kind,
            stream.state.name(),
            devices.join(", ")
        );
    }

    println!("\nActive bindings");
    println!("===============");
    if report.bindings.is_empty() {
        println!("  (none)");
    }
    for binding in &report.bindings {
        println!("  {} -> {}", binding.stream, binding.device);
    }
    if report.offline {
        println!("\nAudio subsystem is offline.");
    }

    if let Some(journal) = &report.journal {
        println!("\nJournal ({} calls)", journal.len());
        println!("=======");
        for call in journal.calls() {
            println!("  {call}");
        }
    }
}
