//! WebSocket connection management: per-connection state, the session
//! registry, and the gateway session loop.

pub mod connection;
pub mod gateway;
pub mod registry;
