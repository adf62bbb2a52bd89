//! Push the local snapshot's entities to the master.

use clap::Args;

use crate::config::Config;

use super::CommandError;

/// Push local entities to the master
#[derive(Debug, Args)]
pub struct PushCommand {}

impl PushCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let identity = super::identity(config)?;
        let client = super::client(config)?;

        let snapshot = super::load_snapshot(config)?;
        let total = snapshot.entities.len();
        if total == 0 {
            println!("Nothing to push.");
            return Ok(());
        }

        // The whole snapshot goes every time; the master's replay handling
        // makes re-pushing already-accepted entities a no-op.
        let response = client.push(&identity, snapshot.entities).await?;

        println!(
            "Pushed {} entities, master accepted {}.",
            total, response.accepted_count
        );
        if response.accepted_count < total {
            println!(
                "{} entities were stale or malformed and did not apply.",
                total - response.accepted_count
            );
        }
        Ok(())
    }
}
