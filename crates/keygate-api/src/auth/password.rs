//! Password hashing and verification using Argon2id
//!
//! Implements the credential hasher:
//! - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
//! - Work factor: configurable memory, passes and lanes
//! - Salt: 16 bytes random per hash
//! - Output: 32 bytes, PHC string format
//!
//! Verification recomputes the digest with the parameters embedded in the
//! stored hash and compares in constant time.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use keygate_core::PasswordConfig;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    #[error("Hashing task failed: {0}")]
    TaskFailed(String),
}

/// Output length in bytes
const OUTPUT_LEN: usize = 32;

/// One-way password hasher
///
/// Immutable after construction and safe to share across requests.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    /// Hash of a random value nobody knows, verified against when the
    /// account does not exist so both login failures cost the same.
    decoy_hash: String,
}

impl CredentialHasher {
    /// Build a hasher for the given work factor
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            Some(OUTPUT_LEN),
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut decoy_secret = [0u8; 32];
        OsRng.fill_bytes(&mut decoy_secret);
        let decoy_hash = hash_with(&argon2, &decoy_secret)?;

        Ok(Self { argon2, decoy_hash })
    }

    /// Hash a plaintext password
    ///
    /// Returns a PHC string (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`)
    /// that carries its own salt and parameters.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, password.as_bytes())
    }

    /// Verify a plaintext password against a stored hash
    ///
    /// * `Ok(true)` - Password matches
    /// * `Ok(false)` - Password does not match
    /// * `Err(PasswordError)` - The stored hash is unusable
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
        }
    }

    /// Spend one verification worth of work, always failing
    pub fn verify_decoy(&self, password: &str) -> bool {
        // The outcome is irrelevant, only the cost is.
        let _ = self.verify(password, &self.decoy_hash);
        false
    }

    /// [`hash`](Self::hash) on the blocking thread pool
    pub async fn hash_blocking(
        self: Arc<Self>,
        password: SecretString,
    ) -> Result<String, PasswordError> {
        tokio::task::spawn_blocking(move || self.hash(password.expose_secret()))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking thread pool
    pub async fn verify_blocking(
        self: Arc<Self>,
        password: SecretString,
        hash: String,
    ) -> Result<bool, PasswordError> {
        tokio::task::spawn_blocking(move || self.verify(password.expose_secret(), &hash))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }

    /// [`verify_decoy`](Self::verify_decoy) on the blocking thread pool
    pub async fn verify_decoy_blocking(self: Arc<Self>, password: SecretString) {
        let _ = tokio::task::spawn_blocking(move || self.verify_decoy(password.expose_secret()))
            .await;
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = self.argon2.params();
        f.debug_struct("CredentialHasher")
            .field("m_cost", &params.m_cost())
            .field("t_cost", &params.t_cost())
            .field("p_cost", &params.p_cost())
            .finish()
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &[u8]) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password, &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}
