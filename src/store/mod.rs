//! The canonical entity store and its versioning contract.
//!
//! Durable persistence is an external collaborator's concern; the engine
//! owns the in-memory canonical state, the per-entity version bookkeeping,
//! and the locking discipline. Each entity type is guarded by its own
//! `tokio::sync::Mutex`, which serializes the version-compare-and-apply
//! step for entities of that type without a global lock. Equipment items,
//! checkouts and conflict records share one lock because the open-checkout
//! invariant spans all three.
//!
//! The persistence collaborator exchanges state with the engine through
//! [`Snapshot`], which carries a layout ordinal so stored snapshots from
//! older builds are migrated forward on load (see `schema::migrate`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::models::{
    CheckIn, DeviceInfo, EntityBatch, EquipmentCheckout, EquipmentItem, Member,
    NewMemberRegistration, PracticeSession, ScanEvent, SyncConflict, Syncable,
};
use crate::schema::{self, MigrationError, SNAPSHOT_ORDINAL};

/// Equipment state guarded by a single lock: the open-checkout invariant
/// spans items, checkouts and the conflict ledger.
#[derive(Debug, Default)]
pub struct EquipmentLedger {
    pub items: HashMap<Uuid, EquipmentItem>,
    pub checkouts: HashMap<Uuid, EquipmentCheckout>,
    pub conflicts: HashMap<Uuid, SyncConflict>,
}

impl EquipmentLedger {
    /// The open checkout for an equipment item other than `except`, if any.
    pub fn open_checkout_for(
        &self,
        equipment_id: Uuid,
        except: Uuid,
    ) -> Option<&EquipmentCheckout> {
        self.checkouts
            .values()
            .find(|c| c.equipment_id == equipment_id && c.is_open() && c.entity_id() != except)
    }

    /// Whether any open checkout exists for the equipment item.
    pub fn has_open_checkout(&self, equipment_id: Uuid) -> bool {
        self.checkouts
            .values()
            .any(|c| c.equipment_id == equipment_id && c.is_open())
    }

    /// An existing conflict record covering the given pair of checkouts.
    pub fn conflict_for_pair(&self, a: Uuid, b: Uuid) -> Option<&SyncConflict> {
        self.conflicts.values().find(|c| c.involves(a, b))
    }
}

/// The canonical entity store on this device.
#[derive(Debug, Default)]
pub struct SyncStore {
    members: Mutex<HashMap<Uuid, Member>>,
    check_ins: Mutex<HashMap<Uuid, CheckIn>>,
    practice_sessions: Mutex<HashMap<Uuid, PracticeSession>>,
    scan_events: Mutex<HashMap<Uuid, ScanEvent>>,
    registrations: Mutex<HashMap<Uuid, NewMemberRegistration>>,
    equipment: Mutex<EquipmentLedger>,
    devices: RwLock<HashMap<String, DeviceInfo>>,
}

impl SyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Per-type locks. Holding one serializes version-compare-and-apply for
    // that entity type only.

    pub async fn members(&self) -> MutexGuard<'_, HashMap<Uuid, Member>> {
        self.members.lock().await
    }

    pub async fn check_ins(&self) -> MutexGuard<'_, HashMap<Uuid, CheckIn>> {
        self.check_ins.lock().await
    }

    pub async fn practice_sessions(&self) -> MutexGuard<'_, HashMap<Uuid, PracticeSession>> {
        self.practice_sessions.lock().await
    }

    pub async fn scan_events(&self) -> MutexGuard<'_, HashMap<Uuid, ScanEvent>> {
        self.scan_events.lock().await
    }

    pub async fn registrations(&self) -> MutexGuard<'_, HashMap<Uuid, NewMemberRegistration>> {
        self.registrations.lock().await
    }

    pub async fn equipment(&self) -> MutexGuard<'_, EquipmentLedger> {
        self.equipment.lock().await
    }

    /// All entities mutated at or after `since`, across all types.
    ///
    /// `None` means everything.
    pub async fn changed_since(&self, since: Option<DateTime<Utc>>) -> EntityBatch {
        fn collect<T: Syncable + Clone>(
            map: &HashMap<Uuid, T>,
            since: Option<DateTime<Utc>>,
        ) -> Vec<T> {
            map.values()
                .filter(|e| since.is_none_or(|s| e.envelope().updated_at >= s))
                .cloned()
                .collect()
        }

        let member = collect(&*self.members.lock().await, since);
        let check_in = collect(&*self.check_ins.lock().await, since);
        let practice_session = collect(&*self.practice_sessions.lock().await, since);
        let scan_event = collect(&*self.scan_events.lock().await, since);
        let new_member_registration = collect(&*self.registrations.lock().await, since);
        let equipment = self.equipment.lock().await;
        let equipment_item = collect(&equipment.items, since);
        let equipment_checkout = collect(&equipment.checkouts, since);

        EntityBatch {
            member,
            check_in,
            practice_session,
            scan_event,
            new_member_registration,
            equipment_item,
            equipment_checkout,
        }
    }

    /// Conflict records awaiting a human decision.
    pub async fn pending_conflicts(&self) -> Vec<SyncConflict> {
        self.equipment
            .lock()
            .await
            .conflicts
            .values()
            .filter(|c| c.status == crate::models::SyncConflictStatus::Pending)
            .cloned()
            .collect()
    }

    // ==================== Device roster ====================

    /// Adds or replaces a roster entry.
    pub async fn upsert_device(&self, info: DeviceInfo) {
        self.devices
            .write()
            .await
            .insert(info.device_id.clone(), info);
    }

    /// Refreshes last-seen/online bookkeeping for a known device.
    pub async fn touch_device(&self, device_id: &str, at: DateTime<Utc>) {
        if let Some(info) = self.devices.write().await.get_mut(device_id) {
            info.touch(at);
        }
    }

    /// The known device roster, with `online` judged by last-seen recency
    /// at read time.
    pub async fn devices(&self) -> Vec<DeviceInfo> {
        let now = Utc::now();
        self.devices
            .read()
            .await
            .values()
            .cloned()
            .map(|mut d| {
                d.online = d.is_online_at(now);
                d
            })
            .collect()
    }

    // ==================== Snapshots ====================

    /// Exports the full store state for the persistence collaborator.
    pub async fn snapshot(&self) -> Snapshot {
        let entities = self.changed_since(None).await;
        let conflicts = self
            .equipment
            .lock()
            .await
            .conflicts
            .values()
            .cloned()
            .collect();
        let devices = self.devices().await;

        Snapshot {
            snapshot_ordinal: SNAPSHOT_ORDINAL,
            entities,
            conflicts,
            devices,
        }
    }

    /// Replaces the store contents with a snapshot's.
    pub async fn restore(&self, snapshot: Snapshot) {
        let Snapshot {
            entities,
            conflicts,
            devices,
            ..
        } = snapshot;

        *self.members.lock().await = index(entities.member);
        *self.check_ins.lock().await = index(entities.check_in);
        *self.practice_sessions.lock().await = index(entities.practice_session);
        *self.scan_events.lock().await = index(entities.scan_event);
        *self.registrations.lock().await = index(entities.new_member_registration);

        let mut equipment = self.equipment.lock().await;
        equipment.items = index(entities.equipment_item);
        equipment.checkouts = index(entities.equipment_checkout);
        equipment.conflicts = conflicts.into_iter().map(|c| (c.id, c)).collect();
        drop(equipment);

        *self.devices.write().await = devices
            .into_iter()
            .map(|d| (d.device_id.clone(), d))
            .collect();
    }
}

fn index<T: Syncable>(entities: Vec<T>) -> HashMap<Uuid, T> {
    entities.into_iter().map(|e| (e.entity_id(), e)).collect()
}

/// Serialized store state exchanged with the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Layout ordinal; snapshots from older builds are migrated on load.
    #[serde(default = "first_ordinal")]
    pub snapshot_ordinal: u32,
    pub entities: EntityBatch,
    #[serde(default)]
    pub conflicts: Vec<SyncConflict>,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
}

fn first_ordinal() -> u32 {
    1
}

impl Snapshot {
    /// Parses a stored snapshot, migrating older layouts forward first.
    pub fn from_value(mut value: serde_json::Value) -> Result<Self, SnapshotError> {
        let stored = value
            .get("snapshotOrdinal")
            .and_then(|v| v.as_u64())
            .map_or(1, |v| v as u32);

        schema::migrate(&mut value, stored, SNAPSHOT_ORDINAL).map_err(SnapshotError::Migration)?;
        value["snapshotOrdinal"] = serde_json::json!(SNAPSHOT_ORDINAL);

        serde_json::from_value(value).map_err(SnapshotError::Malformed)
    }
}

/// Errors loading a stored snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    Migration(MigrationError),
    Malformed(serde_json::Error),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Migration(e) => write!(f, "Snapshot migration failed: {}", e),
            SnapshotError::Malformed(e) => write!(f, "Malformed snapshot: {}", e),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Migration(e) => Some(e),
            SnapshotError::Malformed(e) => Some(e),
        }
    }
}
