//! # taskwire-core
//!
//! Shared types for the taskwire real-time session and notification layer.
//!
//! - Branded ID newtypes (`UserId`, `ConnectionId`, `TaskId`)
//! - Domain events published by the task CRUD layer
//! - WebSocket wire-frame types exchanged between gateway and client
//! - Room-name derivation for per-user broadcast targets
//! - Reconnection backoff math used by the client controller

#![deny(unsafe_code)]

pub mod backoff;
pub mod events;
pub mod ids;
pub mod protocol;
pub mod rooms;
