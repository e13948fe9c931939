//! Fieldreg: offline-first beneficiary registration CLI.
//!
//! # Usage
//!
//! ```text
//! fieldreg register --name <name> --phone <phone> --village <village> --role <role>
//! fieldreg sync
//! fieldreg status [--json] [--all]
//! fieldreg session show|login <operator>|logout
//! fieldreg config show|set-endpoint <url>
//! fieldreg daemon start|stop|status|sync
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, daemon::DaemonCommand, register::RegisterArgs,
    session::SessionCommand, status::StatusArgs, sync::SyncArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "fieldreg",
    version,
    about = "Register beneficiaries in the field, with or without connectivity",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a beneficiary; queued locally, synced when online.
    Register(RegisterArgs),

    /// Submit all pending registrations to the remote authority now.
    Sync(SyncArgs),

    /// Show queued and synced registrations on this device.
    Status(StatusArgs),

    /// Manage the local operator session.
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Show or change device configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Register(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Session { command } => commands::session::run(command),
        Commands::Config { command } => commands::config::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
