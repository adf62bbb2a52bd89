//! DojoSync: offline-first synchronization for a dojo's device fleet.
//!
//! A master laptop hosts the canonical state and a small HTTP transport;
//! tablets and displays push their local changes and pull everyone else's.
//! Append-only records merge by last-write-wins on a per-entity version
//! counter; equipment checkouts additionally enforce the one-open-checkout
//! rule, flagging double checkouts as conflicts for a human to resolve.

pub mod commands;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod identity;
pub mod models;
pub mod schema;
pub mod server;
pub mod store;
pub mod sync;
