//! Ruta CLI - inspect device catalogs and run routing scenarios.

mod commands;
mod scenario;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ruta")]
#[command(author, version, about = "Ruta audio routing CLI", long_about = None)]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ruta.toml in the user, then system, config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the device catalog grouped by backend
    Devices(commands::devices::DevicesArgs),

    /// Validate a configuration file
    CheckConfig(commands::check_config::CheckConfigArgs),

    /// Run a scripted routing scenario against the simulated backend
    Simulate(commands::simulate::SimulateArgs),

    /// Show config locations or write a default config
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Devices(args) => commands::devices::run(args, config),
        Commands::CheckConfig(args) => commands::check_config::run(args),
        Commands::Simulate(args) => commands::simulate::run(args, config),
        Commands::Config(args) => commands::config::run(args),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
