//! # taskwire-client
//!
//! Reconnecting WebSocket client for the taskwire gateway.
//!
//! The connection lifecycle is a pure state machine ([`state`]) driven by an
//! async controller ([`controller`]) that owns the transport, the retry
//! timers, and the automatic re-authentication after every successful
//! connect. Credentials come from a [`credentials::CredentialStore`], and
//! pushed events fan out to per-kind subscribers ([`subscriptions`]).

#![deny(unsafe_code)]

pub mod config;
pub mod controller;
pub mod credentials;
pub mod errors;
pub mod state;
pub mod subscriptions;

pub use config::ClientConfig;
pub use controller::{ConnectionStatus, GatewayClient};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use errors::ClientError;
pub use state::{ClientEvent, ClientState, Effect};
