//! The push/pull transport: wire types and the device-side client.

pub mod client;
pub mod protocol;

pub use client::{SyncClient, SyncError};
