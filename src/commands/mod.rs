//! CLI subcommands and their shared plumbing.

mod discover_cmd;
mod pair_cmd;
mod pull_cmd;
mod push_cmd;
mod status_cmd;

pub use discover_cmd::DiscoverCommand;
pub use pair_cmd::PairCommand;
pub use pull_cmd::PullCommand;
pub use push_cmd::PushCommand;
pub use status_cmd::StatusCommand;

use std::io;
use std::path::PathBuf;

use crate::config::Config;
use crate::identity::{DeviceIdentity, IdentityError};
use crate::store::{Snapshot, SnapshotError, SyncStore};
use crate::sync::{SyncClient, SyncError};

/// Loads this device's identity from the configured data dir.
pub(crate) fn identity(config: &Config) -> Result<DeviceIdentity, CommandError> {
    Ok(DeviceIdentity::load_or_create(
        &config.data_dir,
        config.device_type,
        config.device_name.clone(),
    )?)
}

/// Builds a client for the configured master, restoring a persisted token
/// if one exists.
pub(crate) fn client(config: &Config) -> Result<SyncClient, CommandError> {
    let server_url = config
        .server_url
        .as_ref()
        .ok_or(CommandError::MissingServerUrl)?;

    let client = SyncClient::new(server_url);
    match std::fs::read_to_string(config.token_path()) {
        Ok(token) => Ok(client.with_token(token.trim())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(client),
        Err(e) => Err(CommandError::Io(config.token_path(), e)),
    }
}

pub(crate) fn save_token(config: &Config, token: &str) -> Result<(), CommandError> {
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| CommandError::Io(config.data_dir.clone(), e))?;
    std::fs::write(config.token_path(), format!("{}\n", token))
        .map_err(|e| CommandError::Io(config.token_path(), e))
}

fn snapshot_path(config: &Config) -> PathBuf {
    config.data_dir.join("snapshot.json")
}

fn watermark_path(config: &Config) -> PathBuf {
    config.data_dir.join("last_pull")
}

/// Loads the local entity snapshot, migrating old layouts forward.
/// A missing file is an empty store.
pub(crate) fn load_snapshot(config: &Config) -> Result<Snapshot, CommandError> {
    let path = snapshot_path(config);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Snapshot {
                snapshot_ordinal: crate::schema::SNAPSHOT_ORDINAL,
                entities: Default::default(),
                conflicts: Vec::new(),
                devices: Vec::new(),
            });
        }
        Err(e) => return Err(CommandError::Io(path, e)),
    };

    let value =
        serde_json::from_str(&contents).map_err(|e| CommandError::MalformedSnapshot(path, e))?;
    Ok(Snapshot::from_value(value)?)
}

pub(crate) async fn save_snapshot(config: &Config, store: &SyncStore) -> Result<(), CommandError> {
    let snapshot = store.snapshot().await;
    let path = snapshot_path(config);
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| CommandError::Io(config.data_dir.clone(), e))?;
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| CommandError::MalformedSnapshot(path.clone(), e))?;
    std::fs::write(&path, json).map_err(|e| CommandError::Io(path, e))
}

pub(crate) fn load_watermark(config: &Config) -> Option<chrono::DateTime<chrono::Utc>> {
    let contents = std::fs::read_to_string(watermark_path(config)).ok()?;
    contents
        .trim()
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()
}

pub(crate) fn save_watermark(
    config: &Config,
    at: chrono::DateTime<chrono::Utc>,
) -> Result<(), CommandError> {
    let path = watermark_path(config);
    std::fs::write(&path, format!("{}\n", at.to_rfc3339()))
        .map_err(|e| CommandError::Io(path, e))
}

/// Errors from CLI commands
#[derive(Debug)]
pub enum CommandError {
    /// No server_url in config and none discovered.
    MissingServerUrl,
    Identity(IdentityError),
    Sync(SyncError),
    Io(PathBuf, io::Error),
    MalformedSnapshot(PathBuf, serde_json::Error),
    Snapshot(SnapshotError),
    Discovery(io::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::MissingServerUrl => {
                write!(
                    f,
                    "No server_url configured; set DOJOSYNC_SERVER_URL or run 'dojosync discover'"
                )
            }
            CommandError::Identity(e) => write!(f, "{}", e),
            CommandError::Sync(e) => write!(f, "{}", e),
            CommandError::Io(path, e) => write!(f, "I/O error for {}: {}", path.display(), e),
            CommandError::MalformedSnapshot(path, e) => {
                write!(f, "Malformed snapshot {}: {}", path.display(), e)
            }
            CommandError::Snapshot(e) => write!(f, "{}", e),
            CommandError::Discovery(e) => write!(f, "Discovery socket error: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Identity(e) => Some(e),
            CommandError::Sync(e) => Some(e),
            CommandError::Io(_, e) => Some(e),
            CommandError::MalformedSnapshot(_, e) => Some(e),
            CommandError::Snapshot(e) => Some(e),
            CommandError::Discovery(e) => Some(e),
            CommandError::MissingServerUrl => None,
        }
    }
}

impl From<IdentityError> for CommandError {
    fn from(e: IdentityError) -> Self {
        CommandError::Identity(e)
    }
}

impl From<SyncError> for CommandError {
    fn from(e: SyncError) -> Self {
        CommandError::Sync(e)
    }
}

impl From<SnapshotError> for CommandError {
    fn from(e: SnapshotError) -> Self {
        CommandError::Snapshot(e)
    }
}
