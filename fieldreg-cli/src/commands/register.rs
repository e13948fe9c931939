//! `fieldreg register`: accept a beneficiary regardless of network state.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use fieldreg_core::{queue, session, types::Beneficiary, Config};
use fieldreg_sync::{intake, Connectivity, DrainOutcome, SyncCoordinator};

/// Arguments for `fieldreg register`.
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Beneficiary full name.
    #[arg(long)]
    pub name: String,

    /// Contact phone number.
    #[arg(long)]
    pub phone: String,

    /// Home village.
    #[arg(long)]
    pub village: String,

    /// Beneficiary role (e.g. farmer, artisan).
    #[arg(long)]
    pub role: String,

    /// One-off submission endpoint, overriding the device config.
    #[arg(long)]
    pub endpoint: Option<String>,
}

impl RegisterArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let config = Config::load_at(&home).context("failed to load device config")?;
        let operator = session::current_at(&home)
            .context("failed to read local session")?
            .map(|s| s.operator);
        let (client, probe) = super::transport(&config, self.endpoint.as_deref());

        let beneficiary = Beneficiary {
            name: self.name,
            phone: self.phone,
            village: self.village,
            role: self.role,
        };

        // The append inside intake is the one step allowed to fail the
        // command: a record that was never persisted must not look saved.
        let receipt = intake::register_at(&home, beneficiary, operator, &client, &probe)
            .context("could not persist registration on this device")?;

        if receipt.synced_immediately {
            println!(
                "{} '{}' registered and synced ({})",
                "✓".green(),
                receipt.record.beneficiary.name,
                receipt.record.id.short()
            );
        } else {
            println!(
                "{} '{}' saved on device ({}), will sync when online",
                "✓".green(),
                receipt.record.beneficiary.name,
                receipt.record.id.short()
            );
        }

        // Flush any backlog while we know the network is up.
        if probe.is_online() {
            let pending = queue::pending_count_at(&home)?;
            if pending > 0 {
                let coordinator = SyncCoordinator::new(home.clone(), client);
                if let DrainOutcome::Completed(report) = coordinator.drain()? {
                    if report.accepted > 0 {
                        println!("  synced {} queued registration(s)", report.accepted);
                    }
                }
            }
        }

        let pending = queue::pending_count_at(&home)?;
        if pending > 0 {
            println!("  {} registration(s) pending sync", pending.to_string().yellow());
        }
        Ok(())
    }
}
