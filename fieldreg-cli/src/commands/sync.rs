//! `fieldreg sync`: manual drain trigger.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use fieldreg_core::Config;
use fieldreg_sync::{DrainOutcome, DrainReport, SyncCoordinator};

/// Arguments for `fieldreg sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// One-off submission endpoint, overriding the device config.
    #[arg(long)]
    pub endpoint: Option<String>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config = Config::load_at(&home).context("failed to load device config")?;
        let (client, _probe) = super::transport(&config, self.endpoint.as_deref());

        let coordinator = SyncCoordinator::new(home, client);
        match coordinator.drain().context("drain pass failed")? {
            DrainOutcome::Completed(report) => print_report(&report),
            DrainOutcome::AlreadyDraining => {
                println!("a sync pass is already running");
            }
        }
        Ok(())
    }
}

fn print_report(report: &DrainReport) {
    if report.attempted == 0 {
        println!("{} nothing to sync", "✓".green());
        return;
    }

    if report.succeeded() {
        println!(
            "{} synced {} registration(s)",
            "✓".green(),
            report.accepted
        );
    } else {
        println!(
            "{} synced {} of {} registration(s) ({} network error(s), {} rejected)",
            "✗".red(),
            report.accepted,
            report.attempted,
            report.network_errors,
            report.rejected.len()
        );
    }

    // Rejections need operator follow-up; retrying them blindly would fail
    // the same way every pass.
    for rejected in &report.rejected {
        println!("  {} {}: {}", "!".red(), rejected.id.short(), rejected.reason);
    }
}
