//! `fieldreg session`: local operator attribution.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use fieldreg_core::session;

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Show the signed-in operator, if any.
    Show,
    /// Sign an operator in on this device.
    Login { operator: String },
    /// Sign the current operator out.
    Logout,
}

pub fn run(command: SessionCommand) -> Result<()> {
    let home = super::home()?;

    match command {
        SessionCommand::Show => match session::current_at(&home)
            .context("failed to read local session")?
        {
            Some(session) => println!(
                "signed in as '{}' since {}",
                session.operator,
                session.signed_in_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("nobody is signed in on this device"),
        },
        SessionCommand::Login { operator } => {
            let session =
                session::sign_in_at(&home, &operator).context("failed to save session")?;
            println!("{} signed in as '{}'", "✓".green(), session.operator);
        }
        SessionCommand::Logout => {
            session::sign_out_at(&home).context("failed to remove session")?;
            println!("{} signed out", "✓".green());
        }
    }

    Ok(())
}
