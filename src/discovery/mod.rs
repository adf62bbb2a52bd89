//! Zero-configuration peer discovery over UDP multicast.
//!
//! The master laptop advertises itself by multicasting a small JSON beacon
//! every few seconds; devices browse by joining the group and collecting
//! beacons. Beacons are scoped by a shared `network_id` so two dojos on the
//! same LAN never see each other's masters. Discovery is advisory only:
//! trust comes from the pairing handshake, never from a beacon.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::identity::DeviceIdentity;
use crate::models::DeviceType;
use crate::schema::SchemaVersion;

pub const SERVICE_NAME: &str = "dojosync._sync._udp";
pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 70, 80);
pub const MULTICAST_PORT: u16 = 52080;

/// Interval between advertisements.
pub const BEACON_INTERVAL: Duration = Duration::from_secs(5);

/// The advertisement packet, JSON on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beacon {
    /// Always [`SERVICE_NAME`]; packets for other services are dropped.
    pub service: String,
    pub device_id: String,
    pub device_name: String,
    pub device_type: DeviceType,
    pub schema_version: SchemaVersion,
    /// TCP port the sync transport listens on.
    pub port: u16,
    pub network_id: String,
}

impl Beacon {
    pub fn new(identity: &DeviceIdentity, port: u16, network_id: impl Into<String>) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            device_id: identity.device_id_string(),
            device_name: identity.device_name.clone(),
            device_type: identity.device_type,
            schema_version: identity.schema_version,
            port,
            network_id: network_id.into(),
        }
    }
}

/// A master heard on the network.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPeer {
    pub device_id: String,
    pub device_name: String,
    pub device_type: DeviceType,
    pub schema_version: SchemaVersion,
    /// Address of the peer's sync transport, built from the beacon's
    /// source IP and advertised port.
    pub addr: SocketAddr,
}

/// Periodically multicasts a beacon until stopped or dropped.
#[derive(Debug)]
pub struct Advertiser {
    handle: JoinHandle<()>,
}

impl Advertiser {
    /// Starts advertising to the standard multicast group.
    pub async fn spawn(beacon: Beacon) -> io::Result<Self> {
        Self::spawn_to(
            beacon,
            SocketAddr::from((MULTICAST_ADDR, MULTICAST_PORT)),
            BEACON_INTERVAL,
        )
        .await
    }

    /// Starts advertising to an explicit target at a custom interval.
    ///
    /// Tests point this at a plain unicast socket.
    pub async fn spawn_to(
        beacon: Beacon,
        target: SocketAddr,
        interval: Duration,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_multicast_loop_v4(true)?;
        let payload = serde_json::to_vec(&beacon).map_err(io::Error::other)?;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = socket.send_to(&payload, target).await {
                    tracing::warn!("Failed to send discovery beacon: {}", e);
                }
            }
        });

        tracing::info!("Advertising {} on {}", beacon.device_name, target);
        Ok(Self { handle })
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for Advertiser {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Listens for beacons and reports each distinct master once.
#[derive(Debug)]
pub struct Browser {
    socket: UdpSocket,
    network_id: String,
    /// Our own beacons are ignored.
    local_device_id: String,
}

impl Browser {
    /// Joins the standard multicast group.
    pub async fn open(
        network_id: impl Into<String>,
        local_device_id: impl Into<String>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, MULTICAST_PORT)).await?;
        socket.join_multicast_v4(MULTICAST_ADDR, Ipv4Addr::UNSPECIFIED)?;
        Ok(Self {
            socket,
            network_id: network_id.into(),
            local_device_id: local_device_id.into(),
        })
    }

    /// Binds to an explicit address without joining the multicast group.
    ///
    /// Tests pair this with [`Advertiser::spawn_to`].
    pub async fn bind(
        addr: SocketAddr,
        network_id: impl Into<String>,
        local_device_id: impl Into<String>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            network_id: network_id.into(),
            local_device_id: local_device_id.into(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Starts browsing.
    ///
    /// Each distinct master is delivered once on the returned channel,
    /// deduplicated by device id. Malformed packets, foreign services,
    /// other networks and our own beacons are dropped silently.
    pub fn spawn(self) -> (mpsc::Receiver<DiscoveredPeer>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            let mut seen: Vec<String> = Vec::new();
            let mut buf = [0u8; 2048];

            loop {
                let (len, src) = match self.socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::warn!("Discovery socket error: {}", e);
                        break;
                    }
                };

                let beacon: Beacon = match serde_json::from_slice(&buf[..len]) {
                    Ok(beacon) => beacon,
                    Err(_) => continue,
                };
                if beacon.service != SERVICE_NAME
                    || beacon.network_id != self.network_id
                    || beacon.device_id == self.local_device_id
                    || seen.contains(&beacon.device_id)
                {
                    continue;
                }
                seen.push(beacon.device_id.clone());

                let peer = DiscoveredPeer {
                    device_id: beacon.device_id,
                    device_name: beacon.device_name,
                    device_type: beacon.device_type,
                    schema_version: beacon.schema_version,
                    addr: SocketAddr::new(src.ip(), beacon.port),
                };
                tracing::info!("Discovered {} at {}", peer.device_name, peer.addr);
                if tx.send(peer).await.is_err() {
                    break;
                }
            }
        });

        (rx, handle)
    }
}
