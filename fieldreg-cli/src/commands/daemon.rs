//! `fieldreg daemon`: background sync lifecycle.

use anyhow::{Context, Result};
use clap::Subcommand;

use fieldreg_daemon::paths::socket_path;
use fieldreg_daemon::{request_status, request_stop, request_sync, start_blocking, DaemonError};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (probe + drain processor + socket).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Ask the running daemon for an immediate drain pass.
    Sync,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = super::home()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(status) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let payload = serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Sync => match request_sync(&home) {
            Ok(summary) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary)
                        .context("failed to render drain summary JSON")?
                );
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running; use `fieldreg sync` instead");
            }
            Err(err) => return Err(err).context("failed to request sync"),
        },
    }

    Ok(())
}
