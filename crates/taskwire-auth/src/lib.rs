//! # taskwire-auth
//!
//! Bearer-token verification for the taskwire gateway.
//!
//! The verifier is a stateless leaf: it validates an HS256 JWT and returns
//! the subject it names, or a verification failure. Authentication policy
//! (keep the connection open, allow retry) lives in the gateway.

#![deny(unsafe_code)]

pub mod errors;
pub mod verifier;

pub use errors::AuthError;
pub use verifier::TokenVerifier;
