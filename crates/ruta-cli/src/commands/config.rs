//! Config file location and initialization commands.

use clap::{Args, Subcommand};
use ruta_config::{
    CONFIG_FILE_NAME, RutaConfig, ensure_user_config_dir, find_config, system_config_dir,
    user_config_dir,
};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show config directories and the file that would be loaded
    Paths,

    /// Write the default config to the user config directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the default config as TOML
    Default,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Paths => {
            println!("User config:   {}", user_config_dir().display());
            println!("System config: {}", system_config_dir().display());
            match find_config(None) {
                Some(path) => println!("Active:        {}", path.display()),
                None => println!("Active:        (none, using built-in defaults)"),
            }
            Ok(())
        }
        ConfigCommand::Init { force } => {
            let path = ensure_user_config_dir()?.join(CONFIG_FILE_NAME);
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
            RutaConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        ConfigCommand::Default => {
            print!("{}", RutaConfig::default().to_toml()?);
            Ok(())
        }
    }
}
