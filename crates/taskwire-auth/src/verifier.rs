//! HS256 JWT verification and issuance.
//!
//! Claims carry the subject as `id`, matching the tokens the account layer
//! signs at sign-in (`{ id: <user id> }`, 7-day expiry).

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use taskwire_core::ids::UserId;

use crate::errors::AuthError;

/// Default credential lifetime (7 days, matching the account layer).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// JWT claims for a taskwire bearer token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject identifier.
    id: String,
    /// Expiry, seconds since the epoch.
    exp: u64,
}

/// Validates bearer credentials and resolves the subject they name.
///
/// Stateless and cheap to share: safe to call concurrently from every
/// connection task.
pub struct TokenVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier for the given shared secret.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // the original tokens carry no audience or issuer
        validation.required_spec_claims.clear();
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a credential and return the subject it names.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(UserId::from(data.claims.id))
    }

    /// Issue a credential for a subject with the given lifetime.
    ///
    /// Used by the account layer at sign-in and by tests; the gateway
    /// itself only verifies.
    pub fn issue(&self, user_id: &UserId, ttl: Duration) -> Result<String, AuthError> {
        let exp = chrono::Utc::now()
            + chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::zero());
        let claims = Claims {
            id: user_id.as_str().to_owned(),
            #[allow(clippy::cast_sign_loss)]
            exp: exp.timestamp().max(0) as u64,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }
}
