//! Token verification for banter.
//!
//! Tokens are short-lived HMAC-signed JWTs issued by an external
//! credential service. The relay only verifies them; signup/login and
//! token issuance live elsewhere.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{BanterError, Result};

/// A verified identity attached to a connection.
///
/// Immutable for the lifetime of the connection that carried the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User ID.
    pub user_id: i64,
    /// Username.
    pub username: String,
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID).
    pub sub: i64,
    /// Username.
    pub username: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
}

/// Verifier for bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier from the shared HMAC secret.
    pub fn new(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
        }
    }

    /// Verify a token and return the identity it carries.
    ///
    /// Fails with `BanterError::Auth` on any signature, expiry, or
    /// format problem.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| BanterError::Auth(format!("invalid token: {e}")))?;

        Ok(Identity {
            user_id: data.claims.sub,
            username: data.claims.username,
        })
    }
}
