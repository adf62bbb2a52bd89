//! The sync transport server, hosted by the master laptop.
//!
//! Routes:
//!   GET  /status   - public liveness/compat probe
//!   POST /pair     - public pairing handshake
//!   POST /push     - authenticated entity upload
//!   GET  /pull     - authenticated entity download
//!   GET  /devices  - authenticated device roster
//!
//! Authenticated routes require `Authorization: Bearer <token>` with a token
//! issued by `/pair`. The middleware resolves the token to an [`AuthDevice`]
//! and refreshes the roster's last-seen bookkeeping as a side effect.

pub mod handlers;
pub mod tokens;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tower_http::trace::TraceLayer;

use crate::engine::Detector;
use crate::identity::DeviceIdentity;
use crate::models::DeviceType;
use crate::store::SyncStore;
use crate::sync::protocol::ErrorResponse;

use tokens::TokenStore;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<DeviceIdentity>,
    pub store: Arc<SyncStore>,
    pub detector: Detector,
    pub tokens: Arc<TokenStore>,
    pub pairing_code: String,
}

impl AppState {
    pub fn new(identity: DeviceIdentity, pairing_code: impl Into<String>) -> Self {
        let store = Arc::new(SyncStore::new());
        let detector = Detector::new(store.clone(), identity.device_id_string());
        Self {
            identity: Arc::new(identity),
            store,
            detector,
            tokens: Arc::new(TokenStore::default()),
            pairing_code: pairing_code.into(),
        }
    }
}

/// The authenticated caller, attached as a request extension by the
/// auth middleware.
#[derive(Debug, Clone)]
pub struct AuthDevice {
    pub device_id: String,
    pub device_type: DeviceType,
}

async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "missing_token",
                "Authorization: Bearer <token> required",
            )),
        )
            .into_response();
    };

    let Some(paired) = state.tokens.verify(token) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "invalid_token",
                "Token unknown or expired; re-pair with the master",
            )),
        )
            .into_response();
    };

    state.store.touch_device(&paired.device_id, Utc::now()).await;

    request.extensions_mut().insert(AuthDevice {
        device_id: paired.device_id,
        device_type: paired.device_type,
    });

    next.run(request).await
}

/// Builds the sync router.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/status", get(handlers::status))
        .route("/pair", post(handlers::pair));

    let protected = Router::new()
        .route("/push", post(handlers::push))
        .route("/pull", get(handlers::pull))
        .route("/devices", get(handlers::devices))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
