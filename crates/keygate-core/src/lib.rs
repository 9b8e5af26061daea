//! Keygate Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout keygate:
//! - Account and identity models
//! - Roles
//! - The account directory trait and its backends
//! - Configuration management

pub mod config;
pub mod directory;
pub mod postgres;

pub use config::{
    AppConfig, AuthConfig, BootstrapConfig, ConfigError, DatabaseConfig, LoggingConfig,
    PasswordConfig, ServerConfig,
};
pub use directory::{AccountDirectory, InMemoryDirectory};
pub use postgres::PgAccountDirectory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Errors reported by an account directory backend
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    #[error("Account not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt account record: {0}")]
    CorruptRecord(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

// ============================================================================
// Roles
// ============================================================================

/// Permission tier of an account
///
/// There are exactly two tiers. `User` is the default and the only role
/// self-registration can ever produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Convert role to its wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known role
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// A stored account
///
/// The credential hash is opaque to everything but the credential hasher and
/// is never serialized.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier
    pub id: Uuid,

    /// Login name, unique across the directory
    pub username: String,

    /// PHC-format password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Permission tier
    pub role: Role,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a fresh identifier
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            role,
            created_at: Utc::now(),
        }
    }

    /// Public projection of this account
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish()
    }
}

// ============================================================================
// Identity
// ============================================================================

/// An authenticated principal
///
/// Derived from a verified token for the lifetime of one request, and the
/// shape every user-facing response exposes for an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(id: Uuid, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        account.identity()
    }
}
