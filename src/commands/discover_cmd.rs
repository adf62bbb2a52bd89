//! Find masters advertising on the local network.

use std::time::Duration;

use clap::Args;

use crate::config::Config;
use crate::discovery::Browser;

use super::CommandError;

/// Listen for masters on the local network
#[derive(Debug, Args)]
pub struct DiscoverCommand {
    /// How long to listen, in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

impl DiscoverCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let identity = super::identity(config)?;

        let browser = Browser::open(&config.network_id, identity.device_id_string())
            .await
            .map_err(CommandError::Discovery)?;
        let (mut rx, handle) = browser.spawn();

        println!(
            "Listening for masters on network '{}' for {}s...",
            config.network_id, self.timeout
        );

        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.timeout);
        let mut found = 0;
        loop {
            let peer = tokio::select! {
                peer = rx.recv() => match peer {
                    Some(peer) => peer,
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => break,
            };
            found += 1;
            println!(
                "  {} ({:?}) at http://{} schema {}",
                peer.device_name, peer.device_type, peer.addr, peer.schema_version
            );
        }
        handle.abort();

        if found == 0 {
            println!("No masters found.");
        } else {
            println!();
            println!("Set server_url to one of the addresses above to sync.");
        }
        Ok(())
    }
}
