//! The conflict ledger: durable records of detected concurrent mutations.
//!
//! A `SyncConflict` is not an error. It is a deferred, queryable state that
//! requires a human decision; the admin application resolves it through the
//! engine's `ResolveConflicts` capability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::equipment::EquipmentCheckout;
use super::Syncable;

/// What kind of concurrent mutation was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    /// Two devices issued the same equipment item concurrently.
    DoubleCheckout,
}

/// Lifecycle of a conflict record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncConflictStatus {
    /// Awaiting a human decision.
    Pending,
    /// An operator recorded a resolution.
    Resolved,
    /// The resolved record has been exported to the other devices.
    Synced,
}

/// One side of a detected conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSide {
    pub checkout_id: Uuid,
    pub device_id: String,
    pub checked_out_at: DateTime<Utc>,
    pub sync_version: i64,
}

impl ConflictSide {
    pub fn from_checkout(checkout: &EquipmentCheckout) -> Self {
        Self {
            checkout_id: checkout.entity_id(),
            device_id: checkout.sync.device_id.clone(),
            checked_out_at: checkout.checked_out_at,
            sync_version: checkout.sync_version(),
        }
    }
}

/// One record per detected conflict. Owned by the master device only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: Uuid,
    pub conflict_type: ConflictType,
    /// Entity type of the losing record ("equipmentCheckout" today).
    pub entity_type: String,
    /// Id of the losing record.
    pub entity_id: Uuid,
    /// The contended equipment item.
    pub equipment_id: Uuid,
    pub winner: ConflictSide,
    pub loser: ConflictSide,
    pub status: SyncConflictStatus,
    #[serde(default)]
    pub resolution: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl SyncConflict {
    /// Records a double-checkout conflict between a winning and a losing
    /// checkout of the same equipment item.
    pub fn double_checkout(winner: &EquipmentCheckout, loser: &EquipmentCheckout) -> Self {
        Self {
            id: Uuid::new_v4(),
            conflict_type: ConflictType::DoubleCheckout,
            entity_type: "equipmentCheckout".to_string(),
            entity_id: loser.entity_id(),
            equipment_id: loser.equipment_id,
            winner: ConflictSide::from_checkout(winner),
            loser: ConflictSide::from_checkout(loser),
            status: SyncConflictStatus::Pending,
            resolution: None,
            detected_at: Utc::now(),
        }
    }

    /// True if this record covers the given pair of checkout ids, in either
    /// order. Used to keep replayed pushes from creating duplicates.
    pub fn involves(&self, a: Uuid, b: Uuid) -> bool {
        (self.winner.checkout_id == a && self.loser.checkout_id == b)
            || (self.winner.checkout_id == b && self.loser.checkout_id == a)
    }
}
