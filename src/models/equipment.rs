//! Equipment inventory and checkout lifecycle records.
//!
//! `EquipmentCheckout` is the one genuinely mutable shared resource in the
//! system: a checkout is created open (`checkedInAt == null`) and later
//! closed by a check-in. At most one checkout per equipment item may be open
//! at any causally-consistent point in time; concurrent violations of that
//! invariant are detected by the conflict engine and recorded as
//! `SyncConflict` entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SyncEnvelope;

/// Inventory status of an equipment item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    Available,
    CheckedOut,
    Maintenance,
    Retired,
}

/// A piece of club equipment (sparring gear, pads, training weapons).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentItem {
    #[serde(flatten)]
    pub sync: SyncEnvelope,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub status: EquipmentStatus,
}

impl EquipmentItem {
    pub fn new(name: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            sync: SyncEnvelope::new(device_id),
            name: name.into(),
            category: None,
            status: EquipmentStatus::Available,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Conflict marker carried on a checkout record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictStatus {
    #[default]
    None,
    Pending,
    Resolved,
}

/// A checkout lifecycle record: created open, later closed by a check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentCheckout {
    #[serde(flatten)]
    pub sync: SyncEnvelope,
    pub equipment_id: Uuid,
    pub membership_id: Uuid,
    pub checked_out_at: DateTime<Utc>,
    #[serde(default)]
    pub checked_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conflict_status: ConflictStatus,
    /// The other checkout involved when this record lost a double-checkout
    /// conflict.
    #[serde(default)]
    pub conflicting_checkout_id: Option<Uuid>,
}

impl EquipmentCheckout {
    pub fn new(
        equipment_id: Uuid,
        membership_id: Uuid,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            sync: SyncEnvelope::new(device_id),
            equipment_id,
            membership_id,
            checked_out_at: Utc::now(),
            checked_in_at: None,
            conflict_status: ConflictStatus::None,
            conflicting_checkout_id: None,
        }
    }

    /// An open checkout represents currently-issued equipment.
    pub fn is_open(&self) -> bool {
        self.checked_in_at.is_none()
    }

    /// Closes the checkout, recording the return time.
    pub fn check_in(&mut self, at: DateTime<Utc>, device_id: impl Into<String>) {
        self.checked_in_at = Some(at);
        self.sync.bump(device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checkout_is_open() {
        let checkout = EquipmentCheckout::new(Uuid::new_v4(), Uuid::new_v4(), "tablet-1");

        assert!(checkout.is_open());
        assert_eq!(checkout.conflict_status, ConflictStatus::None);
        assert!(checkout.conflicting_checkout_id.is_none());
    }

    #[test]
    fn test_check_in_closes_and_bumps() {
        let mut checkout = EquipmentCheckout::new(Uuid::new_v4(), Uuid::new_v4(), "tablet-1");

        checkout.check_in(Utc::now(), "tablet-1");

        assert!(!checkout.is_open());
        assert_eq!(checkout.sync.sync_version, 2);
    }

    #[test]
    fn test_conflict_status_wire_format() {
        assert_eq!(serde_json::to_string(&ConflictStatus::None).unwrap(), "\"None\"");
        assert_eq!(
            serde_json::to_string(&ConflictStatus::Pending).unwrap(),
            "\"Pending\""
        );
    }

    #[test]
    fn test_conflict_status_defaults_to_none() {
        // Older devices may omit the field entirely.
        let json = format!(
            r#"{{"id":"{}","syncVersion":1,"deviceId":"d1","updatedAt":"2025-01-01T00:00:00Z",
                "equipmentId":"{}","membershipId":"{}","checkedOutAt":"2025-01-01T00:00:00Z"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let checkout: EquipmentCheckout = serde_json::from_str(&json).unwrap();

        assert_eq!(checkout.conflict_status, ConflictStatus::None);
        assert!(checkout.is_open());
    }

    #[test]
    fn test_equipment_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&EquipmentStatus::CheckedOut).unwrap(),
            "\"CHECKED_OUT\""
        );
    }
}
