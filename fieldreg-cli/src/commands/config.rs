//! `fieldreg config`: device configuration.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use fieldreg_core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective device configuration.
    Show,
    /// Set the submission endpoint (also used as the connectivity probe).
    SetEndpoint { url: String },
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let home = super::home()?;
    let mut config = Config::load_at(&home).context("failed to load device config")?;

    match command {
        ConfigCommand::Show => {
            println!("endpoint:             {}", config.endpoint);
            println!("probe interval:       {}s", config.probe_interval_secs);
            println!("request timeout:      {}s", config.request_timeout_secs);
        }
        ConfigCommand::SetEndpoint { url } => {
            config.endpoint = url;
            config.save_at(&home).context("failed to save device config")?;
            println!("{} endpoint set to {}", "✓".green(), config.endpoint);
        }
    }

    Ok(())
}
