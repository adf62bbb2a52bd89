//! HTTP client for talking to the master's sync transport.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use crate::identity::DeviceIdentity;
use crate::models::EntityBatch;
use crate::schema::SchemaVersion;
use crate::sync::protocol::{
    DevicesResponse, ErrorResponse, PairRequest, PairResponse, PullResponse, PushRequest,
    PushResponse, StatusResponse, UpgradeRequired,
};

/// Client for the master's push/pull endpoints.
///
/// `pair` stores the issued token on the client; the caller persists it
/// between runs and restores it with [`SyncClient::with_token`].
#[derive(Debug, Clone)]
pub struct SyncClient {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl SyncClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        let mut base_url = server_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
            token: None,
        }
    }

    /// Restores a previously issued token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The current bearer token, if paired.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<&str, SyncError> {
        self.token.as_deref().ok_or(SyncError::NotPaired)
    }

    /// `GET /status` on the master. Public, no token needed.
    pub async fn status(&self) -> Result<StatusResponse, SyncError> {
        let response = self.client.get(self.url("/status")).send().await?;
        parse(response).await
    }

    /// Pairs with the master and stores the issued token.
    pub async fn pair(
        &mut self,
        identity: &DeviceIdentity,
        pairing_code: impl Into<String>,
    ) -> Result<PairResponse, SyncError> {
        let request = PairRequest {
            device_id: identity.device_id_string(),
            device_type: identity.device_type,
            device_name: identity.device_name.clone(),
            pairing_code: pairing_code.into(),
        };

        let response = self
            .client
            .post(self.url("/pair"))
            .json(&request)
            .send()
            .await?;
        let paired: PairResponse = parse(response).await?;
        self.token = Some(paired.token.clone());
        Ok(paired)
    }

    /// Pushes a batch of locally changed entities.
    pub async fn push(
        &self,
        identity: &DeviceIdentity,
        entities: EntityBatch,
    ) -> Result<PushResponse, SyncError> {
        let request = PushRequest {
            device_id: identity.device_id_string(),
            device_type: identity.device_type,
            schema_version: identity.schema_version,
            entities,
        };

        let response = self
            .client
            .post(self.url("/push"))
            .bearer_auth(self.bearer()?)
            .json(&request)
            .send()
            .await?;
        parse(response).await
    }

    /// Pulls entities changed at or after `since` (everything when `None`).
    pub async fn pull(&self, since: Option<DateTime<Utc>>) -> Result<PullResponse, SyncError> {
        let mut request = self
            .client
            .get(self.url("/pull"))
            .bearer_auth(self.bearer()?);
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }

        let response = request.send().await?;
        parse(response).await
    }

    /// The master's device roster.
    pub async fn devices(&self) -> Result<DevicesResponse, SyncError> {
        let response = self
            .client
            .get(self.url("/devices"))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        parse(response).await
    }
}

async fn parse<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SyncError> {
    let status = response.status();

    if status == StatusCode::UPGRADE_REQUIRED {
        let signal: UpgradeRequired = response.json().await?;
        return Err(SyncError::SchemaIncompatible {
            required: signal.required_version,
        });
    }
    if status == StatusCode::UNAUTHORIZED {
        let body: ErrorResponse = response.json().await.unwrap_or_else(|_| {
            ErrorResponse::new("unauthorized", "Request was refused")
        });
        return Err(SyncError::Unauthorized(body.message));
    }
    if !status.is_success() {
        return Err(SyncError::Api {
            status,
            message: response.text().await.unwrap_or_default(),
        });
    }

    Ok(response.json().await?)
}

/// Errors talking to the master.
#[derive(Debug)]
pub enum SyncError {
    /// No token; pair first.
    NotPaired,
    Transport(reqwest::Error),
    /// The master runs a different major schema version.
    SchemaIncompatible { required: SchemaVersion },
    /// Token rejected or pairing code wrong.
    Unauthorized(String),
    Api {
        status: StatusCode,
        message: String,
    },
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transport(e)
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::NotPaired => {
                write!(f, "Not paired with a master; run 'dojosync pair' first")
            }
            SyncError::Transport(e) => write!(f, "Transport error: {}", e),
            SyncError::SchemaIncompatible { required } => {
                write!(
                    f,
                    "Master requires schema version {}; upgrade this device",
                    required
                )
            }
            SyncError::Unauthorized(message) => write!(f, "Unauthorized: {}", message),
            SyncError::Api { status, message } => {
                write!(f, "Server returned {}: {}", status, message)
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Transport(e) => Some(e),
            _ => None,
        }
    }
}
