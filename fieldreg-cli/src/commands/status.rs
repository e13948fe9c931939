//! `fieldreg status`: queue visibility.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use fieldreg_core::{queue, types::PendingRegistration};

/// Arguments for `fieldreg status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Include already-synced registrations in the listing.
    #[arg(long)]
    pub all: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "VILLAGE")]
    village: String,
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "REGISTERED")]
    registered: String,
    #[tabled(rename = "SYNCED")]
    synced: String,
}

#[derive(Serialize)]
struct StatusJson {
    pending: usize,
    synced: usize,
    records: Vec<RecordJson>,
}

#[derive(Serialize)]
struct RecordJson {
    id: String,
    name: String,
    village: String,
    role: String,
    registered_by: Option<String>,
    created_at: DateTime<Utc>,
    synced: bool,
    synced_at: Option<DateTime<Utc>>,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let records = queue::list_at(&home).context("failed to read the registration queue")?;

        // Counted from the store on every invocation; there is no cached
        // pending counter anywhere that could drift.
        let pending = records.iter().filter(|r| !r.synced).count();
        let synced = records.len() - pending;

        if self.json {
            let listed = records
                .iter()
                .filter(|r| self.all || !r.synced)
                .map(record_json)
                .collect();
            let payload = StatusJson {
                pending,
                synced,
                records: listed,
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
            return Ok(());
        }

        let rows: Vec<StatusRow> = records
            .iter()
            .filter(|r| self.all || !r.synced)
            .map(row)
            .collect();

        if rows.is_empty() {
            if pending == 0 && synced > 0 {
                println!("{} all {} registration(s) synced", "✓".green(), synced);
            } else {
                println!("no registrations on this device");
            }
            return Ok(());
        }

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!(
            "{} pending, {} synced",
            pending.to_string().yellow(),
            synced.to_string().green()
        );
        Ok(())
    }
}

fn row(record: &PendingRegistration) -> StatusRow {
    StatusRow {
        id: record.id.short().to_string(),
        name: record.beneficiary.name.clone(),
        village: record.beneficiary.village.clone(),
        role: record.beneficiary.role.clone(),
        registered: format_age(record.created_at),
        synced: if record.synced {
            "✓".to_string()
        } else {
            "pending".to_string()
        },
    }
}

fn record_json(record: &PendingRegistration) -> RecordJson {
    RecordJson {
        id: record.id.0.clone(),
        name: record.beneficiary.name.clone(),
        village: record.beneficiary.village.clone(),
        role: record.beneficiary.role.clone(),
        registered_by: record.registered_by.clone(),
        created_at: record.created_at,
        synced: record.synced,
        synced_at: record.synced_at,
    }
}

/// Human-readable age, coarsest unit only.
fn format_age(at: DateTime<Utc>) -> String {
    let delta = Utc::now().signed_duration_since(at);
    if delta.num_days() > 0 {
        format!("{}d ago", delta.num_days())
    } else if delta.num_hours() > 0 {
        format!("{}h ago", delta.num_hours())
    } else if delta.num_minutes() > 0 {
        format!("{}m ago", delta.num_minutes())
    } else {
        "just now".to_string()
    }
}
