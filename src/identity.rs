//! This device's stable identity.
//!
//! The device id is generated once, persisted to `<data_dir>/device_id`,
//! and reloaded across restarts. Identity is read-only after creation and
//! is shared with every other component: discovery beacons, the pairing
//! handshake, the transport's status response and every push all carry it.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::models::DeviceType;
use crate::schema::{SchemaVersion, SCHEMA_VERSION};

/// Identity of the local device.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub device_id: Uuid,
    pub device_type: DeviceType,
    pub device_name: String,
    pub schema_version: SchemaVersion,
}

impl DeviceIdentity {
    /// Loads the persisted device id from `data_dir`, generating and
    /// persisting a new one on first run.
    pub fn load_or_create(
        data_dir: &Path,
        device_type: DeviceType,
        device_name: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let path = data_dir.join("device_id");

        let device_id = match std::fs::read_to_string(&path) {
            Ok(contents) => contents
                .trim()
                .parse()
                .map_err(|_| IdentityError::InvalidDeviceId(path.clone(), contents))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let id = Uuid::new_v4();
                std::fs::create_dir_all(data_dir)
                    .map_err(|e| IdentityError::Io(data_dir.to_path_buf(), e))?;
                std::fs::write(&path, format!("{}\n", id))
                    .map_err(|e| IdentityError::Io(path.clone(), e))?;
                tracing::info!("Generated new device id {}", id);
                id
            }
            Err(e) => return Err(IdentityError::Io(path, e)),
        };

        Ok(Self {
            device_id,
            device_type,
            device_name: device_name.into(),
            schema_version: SCHEMA_VERSION,
        })
    }

    /// True for the master laptop role.
    pub fn is_master(&self) -> bool {
        self.device_type.is_master()
    }

    pub fn device_id_string(&self) -> String {
        self.device_id.to_string()
    }
}

/// Errors loading or creating the device identity.
#[derive(Debug)]
pub enum IdentityError {
    Io(PathBuf, io::Error),
    InvalidDeviceId(PathBuf, String),
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::Io(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            IdentityError::InvalidDeviceId(path, contents) => {
                write!(
                    f,
                    "Device id file {} is not a UUID: '{}'",
                    path.display(),
                    contents.trim()
                )
            }
        }
    }
}

impl std::error::Error for IdentityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IdentityError::Io(_, e) => Some(e),
            IdentityError::InvalidDeviceId(_, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_run_generates_and_persists() {
        let temp_dir = TempDir::new().unwrap();

        let identity =
            DeviceIdentity::load_or_create(temp_dir.path(), DeviceType::Laptop, "master").unwrap();

        assert!(identity.is_master());
        assert_eq!(identity.schema_version, SCHEMA_VERSION);
        assert!(temp_dir.path().join("device_id").exists());
    }

    #[test]
    fn test_id_is_stable_across_loads() {
        let temp_dir = TempDir::new().unwrap();

        let first =
            DeviceIdentity::load_or_create(temp_dir.path(), DeviceType::MemberTablet, "tablet")
                .unwrap();
        let second =
            DeviceIdentity::load_or_create(temp_dir.path(), DeviceType::MemberTablet, "tablet")
                .unwrap();

        assert_eq!(first.device_id, second.device_id);
    }

    #[test]
    fn test_corrupt_id_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("device_id"), "not-a-uuid").unwrap();

        let result =
            DeviceIdentity::load_or_create(temp_dir.path(), DeviceType::Display, "display");

        assert!(matches!(
            result,
            Err(IdentityError::InvalidDeviceId(_, _))
        ));
    }

    #[test]
    fn test_creates_missing_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("deep").join("data");

        let identity =
            DeviceIdentity::load_or_create(&nested, DeviceType::AdminTablet, "admin").unwrap();

        assert!(!identity.is_master());
        assert!(nested.join("device_id").exists());
    }
}
