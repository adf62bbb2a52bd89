use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dojosync::commands::{
    DiscoverCommand, PairCommand, PullCommand, PushCommand, StatusCommand,
};
use dojosync::config::Config;

#[derive(Parser)]
#[command(name = "dojosync")]
#[command(version)]
#[command(about = "Offline-first sync for dojo devices", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show sync configuration and master status
    Status(StatusCommand),

    /// Pair with the master using its pairing code
    Pair(PairCommand),

    /// Push local entities to the master
    Push(PushCommand),

    /// Pull remote changes into the local snapshot
    Pull(PullCommand),

    /// Listen for masters on the local network
    Discover(DiscoverCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Status(cmd)) => cmd.run(&config).await?,
        Some(Commands::Pair(cmd)) => cmd.run(&config).await?,
        Some(Commands::Push(cmd)) => cmd.run(&config).await?,
        Some(Commands::Pull(cmd)) => cmd.run(&config).await?,
        Some(Commands::Discover(cmd)) => cmd.run(&config).await?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
