use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::SyncEnvelope;

/// Membership status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    Active,
    Inactive,
}

/// A club member.
///
/// Contact and guardian fields are sensitive: they are withheld from the
/// view sent to non-master devices (see `engine::projection`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(flatten)]
    pub sync: SyncEnvelope,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub belt_rank: Option<String>,
    pub status: MemberStatus,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
}

impl Member {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            sync: SyncEnvelope::new(device_id),
            first_name: first_name.into(),
            last_name: last_name.into(),
            birth_date: None,
            belt_rank: None,
            status: MemberStatus::Active,
            email: None,
            phone: None,
            address: None,
            guardian_name: None,
            guardian_phone: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_guardian(
        mut self,
        name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        self.guardian_name = Some(name.into());
        self.guardian_phone = Some(phone.into());
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_new_is_active() {
        let member = Member::new("Mina", "Park", "device-1");

        assert_eq!(member.status, MemberStatus::Active);
        assert_eq!(member.full_name(), "Mina Park");
        assert_eq!(member.sync.sync_version, 1);
    }

    #[test]
    fn test_member_status_wire_format() {
        let json = serde_json::to_string(&MemberStatus::Inactive).unwrap();
        assert_eq!(json, "\"INACTIVE\"");
    }

    #[test]
    fn test_member_json_roundtrip() {
        let member = Member::new("Mina", "Park", "device-1")
            .with_email("mina@example.com")
            .with_guardian("Joon Park", "555-0101");

        let json = serde_json::to_string(&member).unwrap();
        let parsed: Member = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, member);
    }

    #[test]
    fn test_member_envelope_is_flattened() {
        let member = Member::new("Mina", "Park", "device-1");
        let json = serde_json::to_value(&member).unwrap();

        // Envelope fields appear at the top level, not nested.
        assert!(json.get("syncVersion").is_some());
        assert!(json.get("sync").is_none());
        assert!(json.get("firstName").is_some());
    }
}
