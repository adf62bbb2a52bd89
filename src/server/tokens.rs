//! Bearer tokens issued by the pairing handshake.
//!
//! Tokens are stored in memory and are only as durable as the issuing
//! process: a restart invalidates every outstanding token and devices
//! re-pair. Unlike a magic link, a pairing token is presented on every
//! push/pull, so verification does not consume it.

use rand::Rng;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::models::DeviceType;

/// The device a token was issued to.
#[derive(Debug, Clone)]
pub struct PairedDevice {
    pub device_id: String,
    pub device_type: DeviceType,
    pub device_name: String,
    /// When the token expires.
    pub expires_at: Instant,
}

/// In-memory token store with expiry.
///
/// Thread-safe via internal RwLock.
#[derive(Debug)]
pub struct TokenStore {
    /// Tokens indexed by token string.
    tokens: RwLock<HashMap<String, PairedDevice>>,
    /// Default expiry duration.
    default_expiry: Duration,
}

impl TokenStore {
    /// Creates a new token store with the specified default expiry in hours.
    pub fn new(expiry_hours: u64) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            default_expiry: Duration::from_secs(expiry_hours * 3600),
        }
    }

    /// Issues a token for a freshly paired device.
    ///
    /// Any previous token held by the same device id is revoked so a
    /// re-pairing device cannot accumulate credentials.
    pub fn issue(
        &self,
        device_id: &str,
        device_type: DeviceType,
        device_name: &str,
    ) -> String {
        self.issue_with_expiry(device_id, device_type, device_name, self.default_expiry)
    }

    /// Issues a token with a custom expiry duration.
    pub fn issue_with_expiry(
        &self,
        device_id: &str,
        device_type: DeviceType,
        device_name: &str,
        expiry: Duration,
    ) -> String {
        let token = generate_token();

        let mut tokens = self.tokens.write().unwrap();
        tokens.retain(|_, device| device.device_id != device_id);
        tokens.insert(
            token.clone(),
            PairedDevice {
                device_id: device_id.to_string(),
                device_type,
                device_name: device_name.to_string(),
                expires_at: Instant::now() + expiry,
            },
        );

        token
    }

    /// Verifies a token and returns the paired device if valid.
    ///
    /// Returns `None` if the token is unknown or expired. Expired tokens
    /// are removed on the way out.
    pub fn verify(&self, token: &str) -> Option<PairedDevice> {
        let mut tokens = self.tokens.write().unwrap();

        let device = tokens.get(token)?;
        if Instant::now() > device.expires_at {
            tokens.remove(token);
            return None;
        }

        Some(device.clone())
    }

    /// Removes all expired tokens.
    ///
    /// Returns the number of tokens removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut tokens = self.tokens.write().unwrap();
        let now = Instant::now();

        let before = tokens.len();
        tokens.retain(|_, device| device.expires_at > now);
        before - tokens.len()
    }

    /// Returns the number of tokens currently stored.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tokens.read().unwrap().len()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(12) // 12 hours default
    }
}

/// Generates a secure random token.
///
/// Returns 32 random bytes encoded as base64url (no padding).
fn generate_token() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
