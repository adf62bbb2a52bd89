//! DojoSync Master Server
//!
//! Runs the master laptop's sync transport and the discovery advertiser.
//! Paired devices push their local changes here and pull everyone else's;
//! the master holds the canonical state and the conflict ledger.
//!
//! # Configuration
//!
//! Config file (default: ~/.config/dojosync/config.yaml), overridable via
//! environment variables:
//! - `DOJOSYNC_PORT`: Port to listen on (default: 8080)
//! - `DOJOSYNC_DEVICE_NAME`: Name announced in beacons and pairing
//! - `DOJOSYNC_DATA_DIR`: Directory for the device id (default: ~/.dojosync)
//! - `DOJOSYNC_NETWORK_ID`: Discovery scope shared by the dojo's devices
//! - `DOJOSYNC_PAIRING_CODE`: Code devices must present to pair (required)
//!
//! # Endpoints
//!
//! - `GET /status`: Identity and schema version (no auth required)
//! - `POST /pair`: Pairing handshake (no auth required)
//! - `POST /push`, `GET /pull`, `GET /devices`: Bearer token required

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dojosync::config::Config;
use dojosync::discovery::{Advertiser, Beacon};
use dojosync::identity::DeviceIdentity;
use dojosync::models::DeviceType;
use dojosync::server::{router, AppState};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dojosync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::load(None) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // The master refuses to run without a pairing code: an open pairing
    // endpoint would hand out tokens to anyone on the LAN.
    let Some(pairing_code) = config.pairing_code.clone() else {
        tracing::error!("No pairing code configured; set DOJOSYNC_PAIRING_CODE");
        std::process::exit(1);
    };

    let identity = match DeviceIdentity::load_or_create(
        &config.data_dir,
        DeviceType::Laptop,
        config.device_name.clone(),
    ) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("Failed to load device identity: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Master {} ({}) schema {}",
        identity.device_name,
        identity.device_id,
        identity.schema_version
    );

    // Advertise on the LAN so devices can find us without configuration.
    let beacon = Beacon::new(&identity, config.port, &config.network_id);
    let _advertiser = match Advertiser::spawn(beacon).await {
        Ok(advertiser) => Some(advertiser),
        Err(e) => {
            tracing::warn!("Discovery disabled, beacon socket failed: {}", e);
            None
        }
    };

    let state = AppState::new(identity, pairing_code);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting sync server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
