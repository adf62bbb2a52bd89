//! Pair this device with a master.

use clap::Args;

use crate::config::Config;

use super::CommandError;

/// Pair with the master using its pairing code
#[derive(Debug, Args)]
pub struct PairCommand {
    /// Pairing code shown on the master
    #[arg(long)]
    code: String,
}

impl PairCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let identity = super::identity(config)?;
        let mut client = super::client(config)?;

        let paired = client.pair(&identity, &self.code).await?;
        super::save_token(config, &paired.token)?;

        println!("Paired with {} ({})", paired.master_device_name, paired.master_device_id);
        println!("Token saved to {}", config.token_path().display());
        Ok(())
    }
}
