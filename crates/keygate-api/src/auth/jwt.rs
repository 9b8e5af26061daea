//! JWT token issuance and verification
//!
//! Implements stateless identity tokens with HMAC-SHA256 signing.
//! A token carries the account id, username and role and expires a fixed
//! duration after issuance. There is no refresh and no server-side session.

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use keygate_core::{AuthConfig, Identity, Role};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT Claims structure containing the identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - account ID
    pub sub: String,
    /// Account username
    pub username: String,
    /// Account role
    pub role: Role,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
}

/// JWT token issuance and verification errors
///
/// The verification variants are for server-side logs. Clients only ever
/// see a single unauthenticated response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Failed to encode JWT: {0}")]
    Encoding(String),

    #[error("Malformed token")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,
}

impl TokenError {
    /// Short machine-readable name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Encoding(_) => "encoding",
            TokenError::Malformed => "malformed",
            TokenError::Expired => "expired",
            TokenError::InvalidSignature => "invalid_signature",
        }
    }
}

/// Issues and verifies identity tokens
///
/// Holds the process-wide signing secret. Built once at startup and never
/// mutated; replacing the secret invalidates every outstanding token.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_secs: u64,
}

impl TokenService {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl_secs: u64) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is checked in `verify_at` against an explicit clock
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            ttl_secs,
        }
    }

    /// Build from configuration, generating an ephemeral secret when none is set
    pub fn from_config(config: &AuthConfig) -> Self {
        match &config.jwt_secret {
            Some(secret) => Self::new(secret.as_bytes(), &config.issuer, config.token_ttl_secs),
            None => {
                tracing::warn!(
                    "JWT_SECRET is not set; using an ephemeral signing secret, tokens will not survive a restart"
                );
                let mut secret = [0u8; 64];
                rand::thread_rng().fill_bytes(&mut secret);
                Self::new(&secret, &config.issuer, config.token_ttl_secs)
            }
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for an identity, valid from now
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, now_secs())
    }

    /// Issue a token as if the current time were `issued_at`
    pub fn issue_at(&self, identity: &Identity, issued_at: u64) -> Result<String, TokenError> {
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: identity.id.to_string(),
            username: identity.username.clone(),
            role: identity.role,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify a token and recover its identity
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, now_secs())
    }

    /// Verify a token against the given clock
    ///
    /// The signature is checked before the payload is trusted. A token is
    /// valid strictly before its `exp` instant.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Identity, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            },
        )?;

        let claims = token_data.claims;
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        let id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Malformed)?;
        Ok(Identity::new(id, claims.username, claims.role))
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
