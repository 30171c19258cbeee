//! Configuration validation command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use ruta_config::{RutaConfig, ValidationError, validate_config};

#[derive(Args)]
pub struct CheckConfigArgs {
    /// Config file to check
    path: PathBuf,
}

pub fn run(args: CheckConfigArgs) -> anyhow::Result<()> {
    let config = RutaConfig::load(&args.path)
        .with_context(|| format!("loading {}", args.path.display()))?;

    match validate_config(&config) {
        Ok(()) => {
            println!(
                "{}: ok ({} devices, backoff {} ms)",
                args.path.display(),
                config.devices.len(),
                config.recovery.backoff_ms
            );
            Ok(())
        }
        Err(ValidationError::Multiple(errors)) => {
            for error in &errors {
                eprintln!("  {error}");
            }
            anyhow::bail!("{}: {} problems", args.path.display(), errors.len())
        }
        Err(error) => anyhow::bail!("{}: {error}", args.path.display()),
    }
}
