//! Synchronizable entity types and the shared sync envelope.
//!
//! Every entity that crosses the wire carries the same envelope metadata:
//! a stable `id` assigned by the originating device, a `syncVersion` counter
//! incremented by the owning device on every local mutation, the `deviceId`
//! that produced the current version, an `updatedAt` mutation watermark, and
//! a `syncedAt` timestamp set once a peer has accepted the entity.
//!
//! Wire field names are camelCase to match the transport protocol.

pub mod attendance;
pub mod conflict;
pub mod device;
pub mod equipment;
pub mod member;
pub mod registration;

pub use attendance::{CheckIn, PracticeSession, ScanEvent};
pub use conflict::{ConflictSide, ConflictType, SyncConflict, SyncConflictStatus};
pub use device::{DeviceInfo, DeviceType};
pub use equipment::{ConflictStatus, EquipmentCheckout, EquipmentItem, EquipmentStatus};
pub use member::{Member, MemberStatus};
pub use registration::{ApprovalStatus, NewMemberRegistration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version and ownership metadata attached to every synchronizable entity.
///
/// Entities embed this with `#[serde(flatten)]` so the fields appear at the
/// top level of the serialized entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEnvelope {
    /// Stable, globally unique id assigned by the originating device.
    pub id: Uuid,
    /// Monotonically increasing counter, incremented on every local mutation.
    pub sync_version: i64,
    /// Device that produced the current version.
    pub device_id: String,
    /// When the current version was produced.
    pub updated_at: DateTime<Utc>,
    /// Set once the entity has been accepted by a peer.
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncEnvelope {
    /// Creates a fresh envelope for a newly created entity.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sync_version: 1,
            device_id: device_id.into(),
            updated_at: Utc::now(),
            synced_at: None,
        }
    }

    /// Records a local mutation: bumps the version, stamps the watermark,
    /// and clears `synced_at` so the entity is picked up by the next push.
    pub fn bump(&mut self, device_id: impl Into<String>) {
        self.sync_version += 1;
        self.device_id = device_id.into();
        self.updated_at = Utc::now();
        self.synced_at = None;
    }

    /// Marks the entity as accepted by a peer.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.synced_at = Some(at);
    }
}

/// Access to the sync envelope embedded in every synchronizable entity.
pub trait Syncable {
    fn envelope(&self) -> &SyncEnvelope;
    fn envelope_mut(&mut self) -> &mut SyncEnvelope;

    /// The entity's stable id.
    fn entity_id(&self) -> Uuid {
        self.envelope().id
    }

    /// The entity's current version.
    fn sync_version(&self) -> i64 {
        self.envelope().sync_version
    }
}

macro_rules! impl_syncable {
    ($($ty:ty),+ $(,)?) => {
        $(impl Syncable for $ty {
            fn envelope(&self) -> &SyncEnvelope {
                &self.sync
            }

            fn envelope_mut(&mut self) -> &mut SyncEnvelope {
                &mut self.sync
            }
        })+
    };
}

impl_syncable!(
    Member,
    CheckIn,
    PracticeSession,
    ScanEvent,
    NewMemberRegistration,
    EquipmentItem,
    EquipmentCheckout,
);

/// One list per entity type, the shape carried by push and pull bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityBatch {
    pub member: Vec<Member>,
    pub check_in: Vec<CheckIn>,
    pub practice_session: Vec<PracticeSession>,
    pub scan_event: Vec<ScanEvent>,
    pub new_member_registration: Vec<NewMemberRegistration>,
    pub equipment_item: Vec<EquipmentItem>,
    pub equipment_checkout: Vec<EquipmentCheckout>,
}

impl EntityBatch {
    /// Total number of entities across all lists.
    pub fn len(&self) -> usize {
        self.member.len()
            + self.check_in.len()
            + self.practice_session.len()
            + self.scan_event.len()
            + self.new_member_registration.len()
            + self.equipment_item.len()
            + self.equipment_checkout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
