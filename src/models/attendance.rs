//! Append-only attendance facts.
//!
//! Check-ins, practice sessions and scan events are never mutated after
//! creation, so uniqueness of their ids is enough to make concurrent sync
//! conflict-free for these types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SyncEnvelope;

/// A member checking in at the front desk or a self-service tablet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    #[serde(flatten)]
    pub sync: SyncEnvelope,
    pub membership_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

impl CheckIn {
    pub fn new(membership_id: Uuid, device_id: impl Into<String>) -> Self {
        Self {
            sync: SyncEnvelope::new(device_id),
            membership_id,
            checked_in_at: Utc::now(),
            session_id: None,
        }
    }
}

/// A logged practice session for a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    #[serde(flatten)]
    pub sync: SyncEnvelope,
    pub membership_id: Uuid,
    pub session_date: NaiveDate,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PracticeSession {
    pub fn new(
        membership_id: Uuid,
        session_date: NaiveDate,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            sync: SyncEnvelope::new(device_id),
            membership_id,
            session_date,
            duration_minutes: None,
            notes: None,
        }
    }
}

/// A raw badge/QR scan captured by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    #[serde(flatten)]
    pub sync: SyncEnvelope,
    pub membership_id: Uuid,
    pub scanned_at: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(membership_id: Uuid, device_id: impl Into<String>) -> Self {
        Self {
            sync: SyncEnvelope::new(device_id),
            membership_id,
            scanned_at: Utc::now(),
        }
    }
}
