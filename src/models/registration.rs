use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SyncEnvelope;

/// Approval workflow state: PENDING -> APPROVED | REJECTED (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Rejected)
    }
}

/// A new-member registration submitted from a self-service tablet.
///
/// The sync engine carries the approval state machine's data; the approval
/// *decision* is made by the admin application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemberRegistration {
    #[serde(flatten)]
    pub sync: SyncEnvelope,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub approval_status: ApprovalStatus,
    /// Set when the registration is approved and a member record is created.
    #[serde(default)]
    pub created_member_id: Option<Uuid>,
}

/// Errors for invalid approval-state transitions.
#[derive(Debug)]
pub enum RegistrationError {
    /// The registration is already in a terminal state.
    AlreadyDecided(ApprovalStatus),
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationError::AlreadyDecided(status) => {
                write!(f, "Registration already decided: {:?}", status)
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

impl NewMemberRegistration {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            sync: SyncEnvelope::new(device_id),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            submitted_at: Utc::now(),
            approval_status: ApprovalStatus::Pending,
            created_member_id: None,
        }
    }

    /// Transitions PENDING -> APPROVED, recording the created member.
    pub fn approve(
        &mut self,
        member_id: Uuid,
        device_id: impl Into<String>,
    ) -> Result<(), RegistrationError> {
        if self.approval_status.is_terminal() {
            return Err(RegistrationError::AlreadyDecided(self.approval_status));
        }
        self.approval_status = ApprovalStatus::Approved;
        self.created_member_id = Some(member_id);
        self.sync.bump(device_id);
        Ok(())
    }

    /// Transitions PENDING -> REJECTED.
    pub fn reject(&mut self, device_id: impl Into<String>) -> Result<(), RegistrationError> {
        if self.approval_status.is_terminal() {
            return Err(RegistrationError::AlreadyDecided(self.approval_status));
        }
        self.approval_status = ApprovalStatus::Rejected;
        self.sync.bump(device_id);
        Ok(())
    }
}
