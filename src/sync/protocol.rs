//! Wire types for the push/pull transport protocol.
//!
//! These shapes are shared by the server handlers and the device-side
//! client. Field names are camelCase on the wire.
//!
//! Push bodies carry their entity lists as raw JSON values
//! ([`RawEntityBatch`]) on the receiving side so that one malformed entity
//! can be skipped without rejecting its siblings; atomicity is per entity,
//! never per payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{DeviceInfo, DeviceType, EntityBatch};
use crate::schema::SchemaVersion;

/// `GET /status` response: identity, schema version and current time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub device_id: String,
    pub device_type: DeviceType,
    pub device_name: String,
    pub schema_version: SchemaVersion,
    pub timestamp: DateTime<Utc>,
}

/// `POST /pair` request: the one-time trust-establishment handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRequest {
    pub device_id: String,
    pub device_type: DeviceType,
    pub device_name: String,
    pub pairing_code: String,
}

/// `POST /pair` response carrying the issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairResponse {
    pub status: String,
    pub token: String,
    pub master_device_id: String,
    pub master_device_name: String,
    pub schema_version: SchemaVersion,
    pub timestamp: DateTime<Utc>,
}

/// `POST /push` request.
///
/// Generic over the batch representation: the client sends a typed
/// [`EntityBatch`], the server receives a [`RawEntityBatch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest<B> {
    pub device_id: String,
    pub device_type: DeviceType,
    pub schema_version: SchemaVersion,
    pub entities: B,
}

/// Entity lists as raw JSON, deserialized one entity at a time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEntityBatch {
    pub member: Vec<Value>,
    pub check_in: Vec<Value>,
    pub practice_session: Vec<Value>,
    pub scan_event: Vec<Value>,
    pub new_member_registration: Vec<Value>,
    pub equipment_item: Vec<Value>,
    pub equipment_checkout: Vec<Value>,
}

/// `POST /push` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub status: String,
    /// Entities the server now holds at or above the pushed version,
    /// including replays of already-applied entities.
    pub accepted_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Distinct upgrade-required signal returned before any state is touched
/// when the pushed major schema version differs from the server's.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequired {
    pub status: String,
    pub required_version: SchemaVersion,
    pub timestamp: DateTime<Utc>,
}

impl UpgradeRequired {
    pub fn new(required_version: SchemaVersion) -> Self {
        Self {
            status: "upgradeRequired".to_string(),
            required_version,
            timestamp: Utc::now(),
        }
    }
}

/// `GET /pull` response, filtered per the pulling device's role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub schema_version: SchemaVersion,
    pub device_id: String,
    pub device_type: DeviceType,
    pub timestamp: DateTime<Utc>,
    pub entities: EntityBatch,
}

/// `GET /devices` response: the master plus the paired roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicesResponse {
    pub master: DeviceInfo,
    pub devices: Vec<DeviceInfo>,
}

/// Generic error body for refused requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Member;
    use crate::schema::SCHEMA_VERSION;

    #[test]
    fn test_typed_push_parses_as_raw() {
        // The client's typed body must round-trip into the server's raw view.
        let request = PushRequest {
            device_id: "d1".to_string(),
            device_type: DeviceType::MemberTablet,
            schema_version: SCHEMA_VERSION,
            entities: EntityBatch {
                member: vec![Member::new("Mina", "Park", "d1")],
                ..Default::default()
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        let raw: PushRequest<RawEntityBatch> = serde_json::from_str(&json).unwrap();

        assert_eq!(raw.device_id, "d1");
        assert_eq!(raw.entities.member.len(), 1);
        assert!(raw.entities.equipment_checkout.is_empty());
    }

    #[test]
    fn test_upgrade_required_shape() {
        let signal = UpgradeRequired::new(SchemaVersion::new(2, 0, 0));
        let json = serde_json::to_value(&signal).unwrap();

        assert_eq!(json["status"], "upgradeRequired");
        assert_eq!(json["requiredVersion"], "2.0.0");
    }

    #[test]
    fn test_raw_batch_tolerates_missing_lists() {
        let raw: RawEntityBatch = serde_json::from_str(r#"{"checkIn": [{"x": 1}]}"#).unwrap();
        assert_eq!(raw.check_in.len(), 1);
        assert!(raw.member.is_empty());
    }
}
