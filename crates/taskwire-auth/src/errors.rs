//! Verification error types.

use thiserror::Error;

/// Why a credential was rejected.
///
/// All variants are policy-equivalent for callers: reject the credential,
/// keep the connection open, do not retry automatically. The distinction
/// exists only for logs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is not a structurally valid JWT.
    #[error("malformed credential")]
    Malformed,
    /// The token's `exp` claim has passed.
    #[error("expired credential")]
    Expired,
    /// The signature does not match the configured secret.
    #[error("credential signature mismatch")]
    InvalidSignature,
    /// Failed to sign a new token.
    #[error("failed to issue credential: {0}")]
    Issue(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed,
        }
    }
}
