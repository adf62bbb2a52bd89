//! Pull changes from the master into the local snapshot.

use std::sync::Arc;

use clap::Args;

use crate::config::Config;
use crate::engine::Detector;
use crate::store::SyncStore;
use crate::sync::protocol::RawEntityBatch;

use super::CommandError;

/// Pull remote changes and merge them into the local snapshot
#[derive(Debug, Args)]
pub struct PullCommand {
    /// Pull everything, ignoring the stored watermark
    #[arg(long)]
    full: bool,
}

impl PullCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        let identity = super::identity(config)?;
        let client = super::client(config)?;

        let since = if self.full {
            None
        } else {
            super::load_watermark(config)
        };
        let response = client.pull(since).await?;
        let pulled = response.entities.len();

        // Merge through the same detector the master runs, so local state
        // obeys the same versioning and conflict rules.
        let store = Arc::new(SyncStore::new());
        store.restore(super::load_snapshot(config)?).await;
        let detector = Detector::new(store.clone(), identity.device_id_string());

        let raw: RawEntityBatch = serde_json::to_value(&response.entities)
            .and_then(serde_json::from_value)
            .map_err(|e| CommandError::MalformedSnapshot(config.data_dir.join("snapshot.json"), e))?;
        let outcome = detector.apply_batch(&raw).await;

        super::save_snapshot(config, &store).await?;
        super::save_watermark(config, response.timestamp)?;

        println!(
            "Pulled {} entities: {} applied, {} already known.",
            pulled, outcome.applied, outcome.replayed
        );
        if outcome.conflicts > 0 {
            println!("{} new conflicts flagged for review.", outcome.conflicts);
        }
        Ok(())
    }
}
