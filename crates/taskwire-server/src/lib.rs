//! # taskwire-server
//!
//! The taskwire real-time gateway: an Axum HTTP + `WebSocket` server that
//! authenticates long-lived connections independently of the handshake,
//! tracks per-connection authentication state, groups connections into
//! per-user rooms, and fans task notifications out to them.
//!
//! - `WebSocket` gateway: connection lifecycle, post-connect authentication,
//!   heartbeat, teardown
//! - Session registry: the single authoritative connection/room map
//! - Notification dispatcher: best-effort event fan-out
//! - HTTP: health check and the CRUD layer's publish hand-off
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod ws;
