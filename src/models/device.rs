use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a device on the club network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    MemberTablet,
    AdminTablet,
    Display,
    /// The master laptop holding the canonical store.
    Laptop,
}

impl DeviceType {
    /// The master role receives unfiltered pulls and owns conflict records.
    pub fn is_master(&self) -> bool {
        matches!(self, DeviceType::Laptop)
    }
}

/// Seconds of silence after which a device is reported offline.
pub const ONLINE_WINDOW_SECS: i64 = 120;

/// A known peer in the device roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_type: DeviceType,
    pub device_name: String,
    /// True once the device has completed the pairing handshake.
    pub trusted: bool,
    pub last_seen: DateTime<Utc>,
    pub online: bool,
}

impl DeviceInfo {
    pub fn new(
        device_id: impl Into<String>,
        device_type: DeviceType,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_type,
            device_name: device_name.into(),
            trusted: false,
            last_seen: Utc::now(),
            online: true,
        }
    }

    pub fn trusted(mut self) -> Self {
        self.trusted = true;
        self
    }

    /// Refreshes the liveness bookkeeping after contact from the device.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_seen = at;
        self.online = true;
    }

    /// Whether the device counts as online at `now`, judged by how
    /// recently it was last seen.
    pub fn is_online_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_seen) < chrono::Duration::seconds(ONLINE_WINDOW_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_laptop_is_master() {
        assert!(DeviceType::Laptop.is_master());
        assert!(!DeviceType::MemberTablet.is_master());
        assert!(!DeviceType::AdminTablet.is_master());
        assert!(!DeviceType::Display.is_master());
    }

    #[test]
    fn test_device_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&DeviceType::MemberTablet).unwrap(),
            "\"MEMBER_TABLET\""
        );
        assert_eq!(
            serde_json::to_string(&DeviceType::Laptop).unwrap(),
            "\"LAPTOP\""
        );
    }

    #[test]
    fn test_touch_updates_liveness() {
        let mut info = DeviceInfo::new("d1", DeviceType::Display, "lobby display");
        info.online = false;

        let now = Utc::now();
        info.touch(now);

        assert!(info.online);
        assert_eq!(info.last_seen, now);
    }

    #[test]
    fn test_online_ages_out_with_last_seen() {
        let info = DeviceInfo::new("d1", DeviceType::MemberTablet, "front desk");
        let now = Utc::now();

        assert!(info.is_online_at(now));
        assert!(info.is_online_at(now + chrono::Duration::seconds(ONLINE_WINDOW_SECS - 1)));
        assert!(!info.is_online_at(now + chrono::Duration::seconds(ONLINE_WINDOW_SECS + 1)));
    }
}
