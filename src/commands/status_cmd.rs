//! Show local configuration and probe the configured master.

use clap::Args;

use crate::config::Config;

use super::CommandError;

/// Show sync configuration and master status
#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let identity = super::identity(config)?;

        println!("Device");
        println!("======");
        println!("Id:      {}", identity.device_id);
        println!("Name:    {}", identity.device_name);
        println!("Type:    {:?}", identity.device_type);
        println!("Schema:  {}", identity.schema_version);
        println!("Network: {}", config.network_id);
        println!();

        let Some(server_url) = config.server_url.as_ref() else {
            println!("Master: not configured");
            println!();
            println!("Set server_url in the config file, DOJOSYNC_SERVER_URL,");
            println!("or run 'dojosync discover' to find one.");
            return Ok(());
        };

        println!("Master: {}", server_url);
        print!("Status: ");

        let client = super::client(config)?;
        match client.status().await {
            Ok(status) => {
                println!("✓ reachable");
                println!("  Name:   {}", status.device_name);
                println!("  Schema: {}", status.schema_version);
                if !identity.schema_version.is_compatible_with(&status.schema_version) {
                    println!("  ✗ schema incompatible; upgrade before syncing");
                }
            }
            Err(e) => println!("✗ {}", e),
        }

        Ok(())
    }
}
