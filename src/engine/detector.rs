//! The conflict detector and ledger.
//!
//! Incoming entity mutations are inspected against locally known state.
//! For append-only types (and entities that only ever have one writer at a
//! time) detection degenerates to last-write-wins on `syncVersion`: an
//! incoming entity is applied if its version is greater than the locally
//! known version for that id, and silently discarded otherwise. An
//! already-applied entity is always safe to re-push.
//!
//! `EquipmentCheckout` is the exception. Before accepting an incoming open
//! checkout, the detector checks the open-checkout invariant: if another
//! checkout for the same equipment item is already open under a different
//! id, that is a true conflict. The earlier `checkedOutAt` wins
//! automatically; the later record is still accepted into storage but
//! marked `Pending`, and a single `SyncConflict` record is created for the
//! pair. Nothing is rolled back; resolution is a human decision reached
//! through the [`ResolveConflicts`] capability.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::models::{
    CheckIn, ConflictStatus, EquipmentCheckout, EquipmentItem, EquipmentStatus, Member,
    NewMemberRegistration, PracticeSession, ScanEvent, SyncConflict, SyncConflictStatus, Syncable,
};
use crate::store::{EquipmentLedger, SyncStore};
use crate::sync::protocol::RawEntityBatch;

use super::projection;

/// Outcome of applying one pushed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Entities newly applied to the store.
    pub applied: usize,
    /// Replays of entities the store already holds at or above the pushed
    /// version. Counted as accepted so identical payloads acknowledge
    /// identically.
    pub replayed: usize,
    /// Malformed entities skipped without affecting their siblings.
    pub invalid: usize,
    /// New conflict records created while applying.
    pub conflicts: usize,
}

impl BatchOutcome {
    /// Entities the server now holds at or above the pushed version.
    pub fn accepted(&self) -> usize {
        self.applied + self.replayed
    }
}

/// Capability for resolving recorded conflicts, consumed by the admin
/// collaborator. The engine owns detection and recording; the resolution
/// policy stays outside it.
#[allow(async_fn_in_trait)]
pub trait ResolveConflicts {
    async fn resolve(
        &self,
        conflict_id: Uuid,
        resolution: String,
    ) -> Result<SyncConflict, ResolveError>;
}

/// Errors from the resolve capability.
#[derive(Debug)]
pub enum ResolveError {
    ConflictNotFound(Uuid),
    AlreadyResolved(Uuid),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::ConflictNotFound(id) => write!(f, "Conflict not found: {}", id),
            ResolveError::AlreadyResolved(id) => write!(f, "Conflict already resolved: {}", id),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Applies incoming mutations to the canonical store.
#[derive(Debug, Clone)]
pub struct Detector {
    store: Arc<SyncStore>,
    /// Device id stamped onto records the detector itself mutates
    /// (conflict marking, resolution bookkeeping).
    local_device_id: String,
}

impl Detector {
    pub fn new(store: Arc<SyncStore>, local_device_id: impl Into<String>) -> Self {
        Self {
            store,
            local_device_id: local_device_id.into(),
        }
    }

    /// Applies every entity in the batch, one at a time.
    ///
    /// One malformed or conflicting entity never blocks its siblings; each
    /// entity type's lock is held only while that type's list is applied.
    pub async fn apply_batch(&self, batch: &RawEntityBatch) -> BatchOutcome {
        let now = Utc::now();
        let mut outcome = BatchOutcome::default();

        {
            let mut members = self.store.members().await;
            for raw in &batch.member {
                match parse_entity::<Member>(raw, "member") {
                    Some(mut incoming) => {
                        // A filtered view pushed back must not erase the
                        // canonical sensitive fields.
                        if let Some(stored) = members.get(&incoming.entity_id()) {
                            projection::restore_member_fields(&mut incoming, stored);
                        }
                        apply_parsed(&mut members, incoming, now, &mut outcome);
                    }
                    None => outcome.invalid += 1,
                }
            }
        }
        {
            let mut check_ins = self.store.check_ins().await;
            for raw in &batch.check_in {
                apply_raw::<CheckIn>(raw, "checkIn", &mut check_ins, now, &mut outcome);
            }
        }
        {
            let mut sessions = self.store.practice_sessions().await;
            for raw in &batch.practice_session {
                apply_raw::<PracticeSession>(
                    raw,
                    "practiceSession",
                    &mut sessions,
                    now,
                    &mut outcome,
                );
            }
        }
        {
            let mut scans = self.store.scan_events().await;
            for raw in &batch.scan_event {
                apply_raw::<ScanEvent>(raw, "scanEvent", &mut scans, now, &mut outcome);
            }
        }
        {
            let mut registrations = self.store.registrations().await;
            for raw in &batch.new_member_registration {
                match parse_entity::<NewMemberRegistration>(raw, "newMemberRegistration") {
                    Some(mut incoming) => {
                        if let Some(stored) = registrations.get(&incoming.entity_id()) {
                            projection::restore_registration_fields(&mut incoming, stored);
                        }
                        apply_parsed(&mut registrations, incoming, now, &mut outcome);
                    }
                    None => outcome.invalid += 1,
                }
            }
        }
        {
            // Items before checkouts so a batch that creates both applies
            // the checkout against the freshly created item.
            let mut ledger = self.store.equipment().await;
            for raw in &batch.equipment_item {
                apply_raw::<EquipmentItem>(raw, "equipmentItem", &mut ledger.items, now, &mut outcome);
            }
            for raw in &batch.equipment_checkout {
                match parse_entity::<EquipmentCheckout>(raw, "equipmentCheckout") {
                    Some(checkout) => self.apply_checkout(&mut ledger, checkout, now, &mut outcome),
                    None => outcome.invalid += 1,
                }
            }
        }

        tracing::debug!(
            "Applied batch: {} applied, {} replayed, {} invalid, {} new conflict(s)",
            outcome.applied,
            outcome.replayed,
            outcome.invalid,
            outcome.conflicts
        );
        outcome
    }

    /// Applies one incoming checkout under the open-checkout invariant.
    fn apply_checkout(
        &self,
        ledger: &mut EquipmentLedger,
        mut incoming: EquipmentCheckout,
        now: DateTime<Utc>,
        outcome: &mut BatchOutcome,
    ) {
        let id = incoming.entity_id();

        if let Some(existing) = ledger.checkouts.get(&id) {
            if existing.sync_version() >= incoming.sync_version() {
                outcome.replayed += 1;
                return;
            }
        }

        if incoming.checked_in_at.is_some() {
            // A check-in (or an already-closed record). The pusher may not
            // know about conflict marking applied here, so carry it over.
            if let Some(existing) = ledger.checkouts.get(&id) {
                if existing.conflict_status != ConflictStatus::None
                    && incoming.conflict_status == ConflictStatus::None
                {
                    incoming.conflict_status = existing.conflict_status;
                    incoming.conflicting_checkout_id = existing.conflicting_checkout_id;
                }
            }
            let equipment_id = incoming.equipment_id;
            incoming.sync.mark_synced(now);
            ledger.checkouts.insert(id, incoming);
            if !ledger.has_open_checkout(equipment_id) {
                self.set_item_status(ledger, equipment_id, EquipmentStatus::Available);
            }
            outcome.applied += 1;
            return;
        }

        // Incoming open checkout.
        match ledger.open_checkout_for(incoming.equipment_id, id).cloned() {
            None => {
                self.set_item_status(ledger, incoming.equipment_id, EquipmentStatus::CheckedOut);
                incoming.sync.mark_synced(now);
                ledger.checkouts.insert(id, incoming);
                outcome.applied += 1;
            }
            Some(other) => {
                // True conflict: the same item is open under another id.
                // The earlier checkedOutAt wins; ties break on checkout id
                // so every device reaches the same verdict.
                let incoming_wins =
                    (incoming.checked_out_at, id) < (other.checked_out_at, other.entity_id());

                let (winner_id, loser_id) = if incoming_wins {
                    (id, other.entity_id())
                } else {
                    (other.entity_id(), id)
                };

                if incoming_wins {
                    let mut loser = other;
                    if loser.conflict_status == ConflictStatus::None {
                        loser.conflict_status = ConflictStatus::Pending;
                        loser.conflicting_checkout_id = Some(id);
                        loser.sync.bump(&self.local_device_id);
                    }
                    self.record_conflict(ledger, &incoming, &loser, outcome);
                    ledger.checkouts.insert(loser_id, loser);
                    incoming.sync.mark_synced(now);
                    ledger.checkouts.insert(id, incoming);
                } else {
                    incoming.conflict_status = ConflictStatus::Pending;
                    incoming.conflicting_checkout_id = Some(winner_id);
                    // The pusher does not know it lost; advance the version
                    // so the marking propagates back on its next pull.
                    incoming.sync.bump(&self.local_device_id);
                    self.record_conflict(ledger, &other, &incoming, outcome);
                    incoming.sync.mark_synced(now);
                    ledger.checkouts.insert(id, incoming);
                }

                tracing::warn!(
                    "Double checkout on equipment {}: winner {}, loser {}",
                    ledger
                        .checkouts
                        .get(&winner_id)
                        .map(|c| c.equipment_id.to_string())
                        .unwrap_or_default(),
                    winner_id,
                    loser_id
                );
                outcome.applied += 1;
            }
        }
    }

    /// Creates a conflict record for the pair unless one already exists.
    fn record_conflict(
        &self,
        ledger: &mut EquipmentLedger,
        winner: &EquipmentCheckout,
        loser: &EquipmentCheckout,
        outcome: &mut BatchOutcome,
    ) {
        if ledger
            .conflict_for_pair(winner.entity_id(), loser.entity_id())
            .is_some()
        {
            return;
        }
        let conflict = SyncConflict::double_checkout(winner, loser);
        ledger.conflicts.insert(conflict.id, conflict);
        outcome.conflicts += 1;
    }

    fn set_item_status(
        &self,
        ledger: &mut EquipmentLedger,
        equipment_id: Uuid,
        status: EquipmentStatus,
    ) {
        match ledger.items.get_mut(&equipment_id) {
            Some(item) if item.status != status => {
                item.status = status;
                item.sync.bump(&self.local_device_id);
            }
            Some(_) => {}
            None => {
                tracing::debug!("Checkout references unknown equipment item {}", equipment_id);
            }
        }
    }

    /// All conflict records, for the admin collaborator.
    pub async fn conflicts(&self) -> Vec<SyncConflict> {
        let ledger = self.store.equipment().await;
        ledger.conflicts.values().cloned().collect()
    }
}

impl ResolveConflicts for Detector {
    /// Records an operator's decision: the conflict becomes RESOLVED and
    /// the losing checkout's marker moves Pending -> Resolved. Which side
    /// keeps the equipment is the operator's call, made outside the engine.
    async fn resolve(
        &self,
        conflict_id: Uuid,
        resolution: String,
    ) -> Result<SyncConflict, ResolveError> {
        let mut ledger = self.store.equipment().await;

        let conflict = ledger
            .conflicts
            .get_mut(&conflict_id)
            .ok_or(ResolveError::ConflictNotFound(conflict_id))?;
        if conflict.status != SyncConflictStatus::Pending {
            return Err(ResolveError::AlreadyResolved(conflict_id));
        }

        conflict.status = SyncConflictStatus::Resolved;
        conflict.resolution = Some(resolution);
        let resolved = conflict.clone();

        if let Some(checkout) = ledger.checkouts.get_mut(&resolved.loser.checkout_id) {
            checkout.conflict_status = ConflictStatus::Resolved;
            checkout.sync.bump(&self.local_device_id);
        }

        tracing::info!("Conflict {} resolved", conflict_id);
        Ok(resolved)
    }
}

/// Deserializes one entity, logging and skipping malformed values.
fn parse_entity<T: DeserializeOwned>(raw: &serde_json::Value, kind: &str) -> Option<T> {
    match serde_json::from_value(raw.clone()) {
        Ok(entity) => Some(entity),
        Err(e) => {
            tracing::warn!("Skipping malformed {} entity: {}", kind, e);
            None
        }
    }
}

/// Last-write-wins on `syncVersion`: applies the incoming entity if its
/// version is greater than the stored one, discards it otherwise.
fn apply_lww<T: Syncable>(
    map: &mut HashMap<Uuid, T>,
    mut incoming: T,
    now: DateTime<Utc>,
) -> bool {
    let id = incoming.entity_id();
    match map.get(&id) {
        Some(existing) if existing.sync_version() >= incoming.sync_version() => false,
        _ => {
            incoming.envelope_mut().mark_synced(now);
            map.insert(id, incoming);
            true
        }
    }
}

fn apply_parsed<T: Syncable>(
    map: &mut HashMap<Uuid, T>,
    entity: T,
    now: DateTime<Utc>,
    outcome: &mut BatchOutcome,
) {
    if apply_lww(map, entity, now) {
        outcome.applied += 1;
    } else {
        outcome.replayed += 1;
    }
}

fn apply_raw<T: Syncable + DeserializeOwned>(
    raw: &serde_json::Value,
    kind: &str,
    map: &mut HashMap<Uuid, T>,
    now: DateTime<Utc>,
    outcome: &mut BatchOutcome,
) {
    match parse_entity::<T>(raw, kind) {
        Some(entity) => apply_parsed(map, entity, now, outcome),
        None => outcome.invalid += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn detector() -> Detector {
        Detector::new(Arc::new(SyncStore::new()), "master")
    }

    fn batch_with_checkouts(checkouts: &[&EquipmentCheckout]) -> RawEntityBatch {
        RawEntityBatch {
            equipment_checkout: checkouts
                .iter()
                .map(|c| serde_json::to_value(c).unwrap())
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lww_applies_higher_version_only() {
        let detector = detector();
        let mut member = Member::new("Mina", "Park", "d1");
        let batch = RawEntityBatch {
            member: vec![serde_json::to_value(&member).unwrap()],
            ..Default::default()
        };

        let first = detector.apply_batch(&batch).await;
        assert_eq!(first.applied, 1);

        // Stale replay of the same version is discarded but acknowledged.
        let second = detector.apply_batch(&batch).await;
        assert_eq!(second.applied, 0);
        assert_eq!(second.replayed, 1);
        assert_eq!(first.accepted(), second.accepted());

        // A newer version replaces the stored one.
        member.belt_rank = Some("red".to_string());
        member.sync.bump("d1");
        let newer = RawEntityBatch {
            member: vec![serde_json::to_value(&member).unwrap()],
            ..Default::default()
        };
        let third = detector.apply_batch(&newer).await;
        assert_eq!(third.applied, 1);

        let stored = detector.store.members().await;
        let stored = stored.get(&member.entity_id()).unwrap();
        assert_eq!(stored.belt_rank.as_deref(), Some("red"));
        assert_eq!(stored.sync_version(), 2);
        assert!(stored.sync.synced_at.is_some());
    }

    #[tokio::test]
    async fn test_version_never_decreases() {
        let detector = detector();
        let mut member = Member::new("Mina", "Park", "d1");
        member.sync.sync_version = 5;
        let batch = RawEntityBatch {
            member: vec![serde_json::to_value(&member).unwrap()],
            ..Default::default()
        };
        detector.apply_batch(&batch).await;

        member.sync.sync_version = 3;
        let stale = RawEntityBatch {
            member: vec![serde_json::to_value(&member).unwrap()],
            ..Default::default()
        };
        detector.apply_batch(&stale).await;

        let stored = detector.store.members().await;
        assert_eq!(stored.get(&member.entity_id()).unwrap().sync_version(), 5);
    }

    #[tokio::test]
    async fn test_malformed_entity_skips_without_blocking_siblings() {
        let detector = detector();
        let good = Member::new("Mina", "Park", "d1");
        let batch = RawEntityBatch {
            member: vec![
                json!({"this": "is not a member"}),
                serde_json::to_value(&good).unwrap(),
            ],
            ..Default::default()
        };

        let outcome = detector.apply_batch(&batch).await;

        assert_eq!(outcome.invalid, 1);
        assert_eq!(outcome.applied, 1);
        assert!(detector.store.members().await.contains_key(&good.entity_id()));
    }

    #[tokio::test]
    async fn test_append_only_types_never_conflict() {
        let detector = detector();
        let member_id = Uuid::new_v4();
        let a = CheckIn::new(member_id, "d1");
        let b = CheckIn::new(member_id, "d2");
        let batch = RawEntityBatch {
            check_in: vec![
                serde_json::to_value(&a).unwrap(),
                serde_json::to_value(&b).unwrap(),
            ],
            ..Default::default()
        };

        let outcome = detector.apply_batch(&batch).await;

        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.conflicts, 0);
        assert_eq!(detector.store.check_ins().await.len(), 2);
    }

    #[tokio::test]
    async fn test_single_open_checkout_accepted() {
        let detector = detector();
        let item = EquipmentItem::new("hogu", "d1");
        let checkout = EquipmentCheckout::new(item.entity_id(), Uuid::new_v4(), "d1");
        let batch = RawEntityBatch {
            equipment_item: vec![serde_json::to_value(&item).unwrap()],
            equipment_checkout: vec![serde_json::to_value(&checkout).unwrap()],
            ..Default::default()
        };

        let outcome = detector.apply_batch(&batch).await;
        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.conflicts, 0);

        let ledger = detector.store.equipment().await;
        assert_eq!(
            ledger.items.get(&item.entity_id()).unwrap().status,
            EquipmentStatus::CheckedOut
        );
        let stored = ledger.checkouts.get(&checkout.entity_id()).unwrap();
        assert_eq!(stored.conflict_status, ConflictStatus::None);
    }

    #[tokio::test]
    async fn test_double_checkout_later_loses() {
        let detector = detector();
        let item = EquipmentItem::new("hogu", "d1");
        let equipment_id = item.entity_id();

        let mut first = EquipmentCheckout::new(equipment_id, Uuid::new_v4(), "tablet-1");
        first.checked_out_at = Utc::now() - Duration::minutes(10);
        let second = EquipmentCheckout::new(equipment_id, Uuid::new_v4(), "tablet-2");

        detector
            .apply_batch(&RawEntityBatch {
                equipment_item: vec![serde_json::to_value(&item).unwrap()],
                equipment_checkout: vec![serde_json::to_value(&first).unwrap()],
                ..Default::default()
            })
            .await;
        let outcome = detector
            .apply_batch(&batch_with_checkouts(&[&second]))
            .await;

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.conflicts, 1);

        let ledger = detector.store.equipment().await;
        let winner = ledger.checkouts.get(&first.entity_id()).unwrap();
        let loser = ledger.checkouts.get(&second.entity_id()).unwrap();
        assert_eq!(winner.conflict_status, ConflictStatus::None);
        assert_eq!(loser.conflict_status, ConflictStatus::Pending);
        assert_eq!(loser.conflicting_checkout_id, Some(first.entity_id()));
        // The loser was marked here, not by its pusher; its version must
        // advance past the pushed one or the marking never propagates.
        assert!(loser.sync_version() > second.sync_version());

        assert_eq!(ledger.conflicts.len(), 1);
        let conflict = ledger.conflicts.values().next().unwrap();
        assert_eq!(conflict.winner.checkout_id, first.entity_id());
        assert_eq!(conflict.loser.checkout_id, second.entity_id());
        assert_eq!(conflict.status, SyncConflictStatus::Pending);
    }

    #[tokio::test]
    async fn test_double_checkout_earlier_arriving_second_wins() {
        let detector = detector();
        let equipment_id = Uuid::new_v4();

        let later = EquipmentCheckout::new(equipment_id, Uuid::new_v4(), "tablet-1");
        let mut earlier = EquipmentCheckout::new(equipment_id, Uuid::new_v4(), "tablet-2");
        earlier.checked_out_at = later.checked_out_at - Duration::minutes(5);

        // The later claim arrives first, then the earlier one syncs in.
        detector.apply_batch(&batch_with_checkouts(&[&later])).await;
        let outcome = detector
            .apply_batch(&batch_with_checkouts(&[&earlier]))
            .await;
        assert_eq!(outcome.conflicts, 1);

        let ledger = detector.store.equipment().await;
        let winner = ledger.checkouts.get(&earlier.entity_id()).unwrap();
        let loser = ledger.checkouts.get(&later.entity_id()).unwrap();
        assert_eq!(winner.conflict_status, ConflictStatus::None);
        assert_eq!(loser.conflict_status, ConflictStatus::Pending);
        assert_eq!(loser.conflicting_checkout_id, Some(earlier.entity_id()));
        // The loser was re-marked locally, so its version advanced and it
        // will propagate on the next pull.
        assert!(loser.sync_version() > later.sync_version());
    }

    #[tokio::test]
    async fn test_conflict_replay_creates_no_duplicate_record() {
        let detector = detector();
        let equipment_id = Uuid::new_v4();
        let mut first = EquipmentCheckout::new(equipment_id, Uuid::new_v4(), "tablet-1");
        first.checked_out_at = Utc::now() - Duration::minutes(10);
        let second = EquipmentCheckout::new(equipment_id, Uuid::new_v4(), "tablet-2");

        detector.apply_batch(&batch_with_checkouts(&[&first])).await;
        detector.apply_batch(&batch_with_checkouts(&[&second])).await;
        // Device 2 retries the identical payload after a timeout.
        let replay = detector.apply_batch(&batch_with_checkouts(&[&second])).await;

        assert_eq!(replay.conflicts, 0);
        assert_eq!(replay.replayed, 1);
        assert_eq!(detector.store.equipment().await.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn test_check_in_same_id_is_an_update() {
        let detector = detector();
        let item = EquipmentItem::new("hogu", "d1");
        let mut checkout = EquipmentCheckout::new(item.entity_id(), Uuid::new_v4(), "tablet-1");

        detector
            .apply_batch(&RawEntityBatch {
                equipment_item: vec![serde_json::to_value(&item).unwrap()],
                equipment_checkout: vec![serde_json::to_value(&checkout).unwrap()],
                ..Default::default()
            })
            .await;

        checkout.check_in(Utc::now(), "tablet-1");
        let outcome = detector
            .apply_batch(&batch_with_checkouts(&[&checkout]))
            .await;
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.conflicts, 0);

        let ledger = detector.store.equipment().await;
        assert!(!ledger.checkouts.get(&checkout.entity_id()).unwrap().is_open());
        assert_eq!(
            ledger.items.get(&item.entity_id()).unwrap().status,
            EquipmentStatus::Available
        );
    }

    #[tokio::test]
    async fn test_filtered_member_push_keeps_canonical_contact_fields() {
        let detector = detector();
        let member = Member::new("Mina", "Park", "laptop")
            .with_email("mina@example.com")
            .with_phone("555-0100");
        detector
            .apply_batch(&RawEntityBatch {
                member: vec![serde_json::to_value(&member).unwrap()],
                ..Default::default()
            })
            .await;

        // A tablet pulls the filtered view, edits a visible field, and
        // pushes the result back.
        let mut edited =
            projection::member_view(&member, crate::models::DeviceType::MemberTablet);
        edited.belt_rank = Some("red".to_string());
        edited.sync.bump("tablet-1");
        let outcome = detector
            .apply_batch(&RawEntityBatch {
                member: vec![serde_json::to_value(&edited).unwrap()],
                ..Default::default()
            })
            .await;
        assert_eq!(outcome.applied, 1);

        let stored = detector.store.members().await;
        let stored = stored.get(&member.entity_id()).unwrap();
        assert_eq!(stored.belt_rank.as_deref(), Some("red"));
        assert_eq!(stored.email.as_deref(), Some("mina@example.com"));
        assert_eq!(stored.phone.as_deref(), Some("555-0100"));
    }

    #[tokio::test]
    async fn test_filtered_registration_push_keeps_contact_fields() {
        let detector = detector();
        let mut registration = NewMemberRegistration::new("Sana", "Kim", "tablet-1");
        registration.email = Some("sana@example.com".to_string());
        registration.phone = Some("555-0200".to_string());
        detector
            .apply_batch(&RawEntityBatch {
                new_member_registration: vec![serde_json::to_value(&registration).unwrap()],
                ..Default::default()
            })
            .await;

        let mut edited = projection::registration_view(
            &registration,
            crate::models::DeviceType::AdminTablet,
        );
        let member_id = Uuid::new_v4();
        edited.approve(member_id, "admin-1").unwrap();
        detector
            .apply_batch(&RawEntityBatch {
                new_member_registration: vec![serde_json::to_value(&edited).unwrap()],
                ..Default::default()
            })
            .await;

        let stored = detector.store.registrations().await;
        let stored = stored.get(&registration.entity_id()).unwrap();
        assert_eq!(stored.created_member_id, Some(member_id));
        assert_eq!(stored.email.as_deref(), Some("sana@example.com"));
        assert_eq!(stored.phone.as_deref(), Some("555-0200"));
    }

    #[tokio::test]
    async fn test_resolve_flips_both_records() {
        let detector = detector();
        let equipment_id = Uuid::new_v4();
        let mut first = EquipmentCheckout::new(equipment_id, Uuid::new_v4(), "tablet-1");
        first.checked_out_at = Utc::now() - Duration::minutes(10);
        let second = EquipmentCheckout::new(equipment_id, Uuid::new_v4(), "tablet-2");
        detector
            .apply_batch(&batch_with_checkouts(&[&first, &second]))
            .await;

        let conflict_id = detector.conflicts().await[0].id;
        let resolved = detector
            .resolve(conflict_id, "shared use, both kept".to_string())
            .await
            .unwrap();

        assert_eq!(resolved.status, SyncConflictStatus::Resolved);
        assert_eq!(resolved.resolution.as_deref(), Some("shared use, both kept"));

        let ledger = detector.store.equipment().await;
        assert_eq!(
            ledger.checkouts.get(&second.entity_id()).unwrap().conflict_status,
            ConflictStatus::Resolved
        );

        drop(ledger);
        let again = detector.resolve(conflict_id, "again".to_string()).await;
        assert!(matches!(again, Err(ResolveError::AlreadyResolved(_))));
    }

    #[tokio::test]
    async fn test_resolve_unknown_conflict() {
        let detector = detector();
        let result = detector.resolve(Uuid::new_v4(), "x".to_string()).await;
        assert!(matches!(result, Err(ResolveError::ConflictNotFound(_))));
    }
}
