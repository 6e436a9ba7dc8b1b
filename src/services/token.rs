//! Bearer token service
//!
//! Issues and validates HS256-signed JWTs carrying the user id and username.
//! A valid token only proves who it was issued to; whether it is still the
//! user's current session is checked by the session guard.

use crate::config::{AuthConfig, MAX_JWT_EXPIRY_HOURS};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Unique per issuance, so two logins in the same second get different tokens
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::InvalidToken)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, malformed, or expired
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Signs and verifies bearer tokens with a process-wide secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Lifetimes above `MAX_JWT_EXPIRY_HOURS` are clamped; `Config::validate`
    /// rejects them before startup.
    pub fn from_config(config: &AuthConfig) -> Self {
        let hours = config.jwt_expiry_hours.min(MAX_JWT_EXPIRY_HOURS) as i64;
        Self::new(&config.jwt_secret, Duration::hours(hours))
    }

    /// Issue a token for the user
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing("token expiry is out of range".to_string()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::InvalidToken)
    }
}
