//! Request handlers for the sync transport.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::projection;
use crate::models::DeviceInfo;
use crate::sync::protocol::{
    DevicesResponse, ErrorResponse, PairRequest, PairResponse, PullResponse, PushRequest,
    PushResponse, RawEntityBatch, StatusResponse, UpgradeRequired,
};

use super::{AppState, AuthDevice};

/// `GET /status`: liveness/compat probe, no side effects.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        device_id: state.identity.device_id_string(),
        device_type: state.identity.device_type,
        device_name: state.identity.device_name.clone(),
        schema_version: state.identity.schema_version,
        timestamp: Utc::now(),
    })
}

/// `POST /pair`: the trust-establishment handshake.
///
/// Verifies the pairing code, issues a bearer token scoped to the
/// requesting device, and registers it in the roster.
pub async fn pair(
    State(state): State<AppState>,
    Json(request): Json<PairRequest>,
) -> Response {
    if request.pairing_code != state.pairing_code {
        tracing::warn!(
            "Rejected pairing attempt from {} ({})",
            request.device_name,
            request.device_id
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("invalid_code", "Pairing code mismatch")),
        )
            .into_response();
    }

    let token = state
        .tokens
        .issue(&request.device_id, request.device_type, &request.device_name);

    state
        .store
        .upsert_device(
            DeviceInfo::new(&request.device_id, request.device_type, &request.device_name)
                .trusted(),
        )
        .await;

    tracing::info!(
        "Paired device {} ({:?}, {})",
        request.device_name,
        request.device_type,
        request.device_id
    );

    Json(PairResponse {
        status: "paired".to_string(),
        token,
        master_device_id: state.identity.device_id_string(),
        master_device_name: state.identity.device_name.clone(),
        schema_version: state.identity.schema_version,
        timestamp: Utc::now(),
    })
    .into_response()
}

/// `POST /push`: accepts a batch of entity mutations.
///
/// The schema gate runs before anything else; on a major-version mismatch
/// the caller gets the upgrade-required signal and no state is touched.
/// After the gate each entity is handed to the conflict detector
/// individually; atomicity is per entity, not per payload.
pub async fn push(
    State(state): State<AppState>,
    Extension(device): Extension<AuthDevice>,
    Json(request): Json<PushRequest<RawEntityBatch>>,
) -> Response {
    if !state
        .identity
        .schema_version
        .is_compatible_with(&request.schema_version)
    {
        tracing::warn!(
            "Refused push from {} at schema {} (ours: {})",
            device.device_id,
            request.schema_version,
            state.identity.schema_version
        );
        return (
            StatusCode::UPGRADE_REQUIRED,
            Json(UpgradeRequired::new(state.identity.schema_version)),
        )
            .into_response();
    }

    let outcome = state.detector.apply_batch(&request.entities).await;

    Json(PushResponse {
        status: "ok".to_string(),
        accepted_count: outcome.accepted(),
        timestamp: Utc::now(),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    /// RFC 3339 watermark; entities mutated at or after it are returned.
    /// Omitted means everything.
    pub since: Option<DateTime<Utc>>,
}

/// `GET /pull?since=...`: returns changed entities, view-projected for the
/// pulling device's role.
pub async fn pull(
    State(state): State<AppState>,
    Extension(device): Extension<AuthDevice>,
    Query(query): Query<PullQuery>,
) -> Json<PullResponse> {
    let batch = state.store.changed_since(query.since).await;
    let entities = projection::batch_view(batch, device.device_type);

    tracing::debug!(
        "Pull from {} ({:?}) since {:?}: {} entities",
        device.device_id,
        device.device_type,
        query.since,
        entities.len()
    );

    Json(PullResponse {
        schema_version: state.identity.schema_version,
        device_id: state.identity.device_id_string(),
        device_type: state.identity.device_type,
        timestamp: Utc::now(),
        entities,
    })
}

/// `GET /devices`: the master plus the paired roster.
pub async fn devices(State(state): State<AppState>) -> Json<DevicesResponse> {
    let mut master = DeviceInfo::new(
        state.identity.device_id_string(),
        state.identity.device_type,
        &state.identity.device_name,
    )
    .trusted();
    master.touch(Utc::now());

    Json(DevicesResponse {
        master,
        devices: state.store.devices().await,
    })
}
