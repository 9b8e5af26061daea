//! Authentication service layer
//!
//! Login, registration and the administrative account operations. Login and
//! registration bypass the guards and talk to the account directory, the
//! credential hasher and the token service directly.

use super::jwt::TokenService;
use super::password::CredentialHasher;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use crate::middleware::AuthMetrics;
use keygate_core::{Account, AccountDirectory, Identity, Role};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Upper bound on password length, keeps hashing cost bounded
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// Deserialize a plaintext credential straight into a [`SecretString`]
fn secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::new("username_charset"));
    }
    Ok(())
}

/// User login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[serde(deserialize_with = "secret_string")]
    pub password: SecretString,
}

/// Self-service registration request
///
/// Carries no role. Any `role` field in the body is dropped during
/// deserialization, whatever its value.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, max = 64),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[serde(deserialize_with = "secret_string")]
    pub password: SecretString,
}

/// Administrative account creation request
#[derive(Debug, Deserialize, Validate)]
pub struct NewAccountRequest {
    #[validate(
        length(min = 1, max = 64),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[serde(deserialize_with = "secret_string")]
    pub password: SecretString,
    #[serde(default)]
    pub role: Option<Role>,
}

impl From<RegisterRequest> for NewAccountRequest {
    fn from(request: RegisterRequest) -> Self {
        Self {
            username: request.username,
            password: request.password,
            role: None,
        }
    }
}

/// Successful login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: Identity,
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

/// Authentication service
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct AuthService {
    directory: Arc<dyn AccountDirectory>,
    hasher: Arc<CredentialHasher>,
    tokens: Arc<TokenService>,
    metrics: Arc<AuthMetrics>,
    min_password_length: usize,
}

impl AuthService {
    pub fn new(
        directory: Arc<dyn AccountDirectory>,
        hasher: Arc<CredentialHasher>,
        tokens: Arc<TokenService>,
        metrics: Arc<AuthMetrics>,
        min_password_length: usize,
    ) -> Self {
        Self {
            directory,
            hasher,
            tokens,
            metrics,
            min_password_length,
        }
    }

    /// Authenticate a user and issue a token
    ///
    /// An unknown username and a wrong password produce the same error, and
    /// both spend one password verification.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> Result<LoginResponse, AppError> {
        request.validate()?;
        check_max_length(&request.password)?;

        let account = match self.directory.find_by_username(&request.username).await? {
            Some(account) => account,
            None => {
                self.hasher.clone().verify_decoy_blocking(request.password).await;
                return Err(self.login_failed(request.username, "unknown username", client));
            }
        };

        let matches = self
            .hasher
            .clone()
            .verify_blocking(request.password, account.password_hash.clone())
            .await?;

        if !matches {
            return Err(self.login_failed(request.username, "wrong password", client));
        }

        let identity = account.identity();
        let token = self.tokens.issue(&identity)?;

        self.metrics.record_login(true);
        audit_log(&AuditEvent::LoginSuccess {
            user_id: identity.id,
            username: identity.username.clone(),
            client: client.clone(),
        });

        Ok(LoginResponse {
            user: identity,
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl_secs(),
        })
    }

    fn login_failed(&self, username: String, reason: &str, client: &ClientInfo) -> AppError {
        self.metrics.record_login(false);
        audit_log(&AuditEvent::LoginFailure {
            username,
            reason: reason.to_string(),
            client: client.clone(),
        });
        AppError::InvalidCredentials
    }

    /// Self-service registration
    ///
    /// The account always gets [`Role::User`].
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientInfo,
    ) -> Result<Identity, AppError> {
        let username = request.username.clone();
        match self.insert_account(request.into(), Role::User).await {
            Ok(account) => {
                let identity = account.identity();
                self.metrics.record_registration();
                audit_log(&AuditEvent::RegistrationSuccess {
                    user_id: identity.id,
                    username: identity.username.clone(),
                    role: identity.role,
                    client: client.clone(),
                });
                Ok(identity)
            }
            Err(err) => {
                audit_log(&AuditEvent::RegistrationFailure {
                    username,
                    reason: err.to_string(),
                    client: client.clone(),
                });
                Err(err)
            }
        }
    }

    /// Administrative account creation; honours the requested role
    pub async fn create_user(
        &self,
        actor: &Identity,
        request: NewAccountRequest,
        client: &ClientInfo,
    ) -> Result<Identity, AppError> {
        let role = request.role.unwrap_or_default();
        let identity = self.insert_account(request, role).await?.identity();

        self.metrics.record_account_created();
        audit_log(&AuditEvent::AccountCreated {
            actor_id: actor.id,
            user_id: identity.id,
            username: identity.username.clone(),
            role: identity.role,
            client: client.clone(),
        });

        Ok(identity)
    }

    /// Validate, hash and store a new account
    async fn insert_account(
        &self,
        request: NewAccountRequest,
        role: Role,
    ) -> Result<Account, AppError> {
        request.validate()?;
        self.check_password(&request.password)?;

        // Skip the hashing cost when the name is obviously taken; `save`
        // still rejects a concurrent duplicate.
        if self
            .directory
            .find_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyExists);
        }

        let password_hash = self.hasher.clone().hash_blocking(request.password).await?;
        let account = Account::new(request.username, password_hash, role);

        Ok(self.directory.save(account).await?)
    }

    fn check_password(&self, password: &SecretString) -> Result<(), AppError> {
        check_max_length(password)?;
        if password.expose_secret().chars().count() < self.min_password_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }

    /// All accounts, oldest first
    pub async fn list_users(&self) -> Result<Vec<Identity>, AppError> {
        let accounts = self.directory.find_all().await?;
        Ok(accounts.iter().map(Identity::from).collect())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Identity, AppError> {
        self.directory
            .find_by_id(id)
            .await?
            .map(|account| account.identity())
            .ok_or(AppError::NotFound)
    }

    /// Delete an account on behalf of an administrator
    ///
    /// An administrator can never delete their own account, even though the
    /// role check passes.
    pub async fn delete_user(
        &self,
        actor: &Identity,
        id: Uuid,
        client: &ClientInfo,
    ) -> Result<(), AppError> {
        if actor.id == id {
            return Err(AppError::BadRequest(
                "You cannot delete your own account".to_string(),
            ));
        }

        self.directory.delete(id).await?;

        self.metrics.record_account_deleted();
        audit_log(&AuditEvent::AccountDeleted {
            actor_id: actor.id,
            user_id: id,
            client: client.clone(),
        });

        Ok(())
    }

    /// Make sure an administrator account exists
    ///
    /// Used at startup to seed the first admin. An existing admin with the
    /// same name is left untouched; a non-admin holding the name is an error.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<Identity, AppError> {
        let existing = match self.directory.find_by_username(username).await? {
            Some(account) => account,
            None => {
                let request = NewAccountRequest {
                    username: username.to_string(),
                    password: SecretString::from(password.to_string()),
                    role: Some(Role::Admin),
                };

                match self.insert_account(request, Role::Admin).await {
                    Ok(account) => {
                        tracing::info!(username = %account.username, "Bootstrap admin account created");
                        return Ok(account.identity());
                    }
                    // Lost a race with another instance seeding the same name
                    Err(AppError::AlreadyExists) => self
                        .directory
                        .find_by_username(username)
                        .await?
                        .ok_or(AppError::NotFound)?,
                    Err(err) => return Err(err),
                }
            }
        };

        if existing.role != Role::Admin {
            tracing::error!(username = %username, role = %existing.role, "Bootstrap admin name is taken by a non-admin account");
            return Err(AppError::AlreadyExists);
        }

        Ok(existing.identity())
    }
}

fn check_max_length(password: &SecretString) -> Result<(), AppError> {
    if password.expose_secret().len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} bytes"
        )));
    }
    Ok(())
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("tokens", &self.tokens)
            .field("hasher", &self.hasher)
            .field("min_password_length", &self.min_password_length)
            .finish_non_exhaustive()
    }
}
