//! Device catalog listing command.

use std::path::Path;

use clap::Args;
use ruta_config::DeviceEntry;
use serde::Serialize;

use super::common::load_config;

#[derive(Args)]
pub struct DevicesArgs {
    /// Print the catalog as JSON
    #[arg(long)]
    json: bool,

    /// Only show devices that are ready
    #[arg(long)]
    ready: bool,
}

#[derive(Serialize)]
struct BackendGroup<'a> {
    backend: &'a str,
    devices: Vec<&'a DeviceEntry>,
}

pub fn run(args: DevicesArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let groups: Vec<BackendGroup<'_>> = config
        .devices
        .by_backend()
        .into_iter()
        .map(|(backend, devices)| BackendGroup {
            backend,
            devices: devices
                .into_iter()
                .filter(|d| !args.ready || d.ready)
                .collect(),
        })
        .filter(|g| !g.devices.is_empty())
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No devices in the catalog.");
        return Ok(());
    }

    println!("Device Catalog");
    println!("==============\n");
    for group in &groups {
        let shared = if group.devices.len() > 1 { " (shared)" } else { "" };
        println!("{}{}:", group.backend, shared);
        for device in &group.devices {
            let ready = if device.ready { "" } else { " [not ready]" };
            let ec = device
                .ec_channels
                .map(|ch| format!(", ec {ch}ch"))
                .unwrap_or_default();
            println!(
                "  {:28} {} Hz, {} ch, {} bit{}{}",
                device.id.name(),
                device.sample_rate,
                device.channels,
                device.bit_width,
                ec,
                ready
            );
        }
        println!();
    }
    println!("{} devices on {} backends", config.devices.len(), groups.len());

    Ok(())
}
