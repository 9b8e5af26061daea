//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{AuthService, CredentialHasher, Operation, OperationGate, PasswordError, TokenService};
use crate::middleware::AuthMetrics;
use keygate_core::config::AppConfig;
use keygate_core::AccountDirectory;
use std::sync::Arc;
use std::time::Instant;

/// Signing secret used by [`AppState::for_testing`]
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_JWT_SECRET: &str = "keygate-test-secret-keygate-test-secret";

/// Application state shared across handlers
///
/// Everything here is immutable after startup or internally synchronized.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Token issuance and verification
    pub tokens: Arc<TokenService>,
    /// Password hashing
    pub hasher: Arc<CredentialHasher>,
    /// Account storage
    pub directory: Arc<dyn AccountDirectory>,
    /// Authentication counters
    pub metrics: Arc<AuthMetrics>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create application state from config and an account directory
    pub fn new(
        config: AppConfig,
        directory: Arc<dyn AccountDirectory>,
    ) -> Result<Self, PasswordError> {
        let tokens = Arc::new(TokenService::from_config(&config.auth));
        let hasher = Arc::new(CredentialHasher::new(&config.password)?);

        Ok(Self {
            config,
            tokens,
            hasher,
            directory,
            metrics: Arc::new(AuthMetrics::new()),
            start_time: Instant::now(),
        })
    }

    /// Authentication service over this state's collaborators
    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.directory.clone(),
            self.hasher.clone(),
            self.tokens.clone(),
            self.metrics.clone(),
            self.config.password.min_length,
        )
    }

    /// Guard middleware state for an operation
    pub fn gate(&self, operation: Operation) -> OperationGate {
        OperationGate::new(operation, self.tokens.clone(), self.metrics.clone())
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// In-memory state with a fixed secret and light hashing parameters
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some(TEST_JWT_SECRET.to_string());
        config.password = keygate_core::PasswordConfig::insecure_fast();

        let directory = Arc::new(keygate_core::InMemoryDirectory::new());
        match Self::new(config, directory) {
            Ok(state) => state,
            Err(e) => panic!("test state: {e}"),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .field("hasher", &self.hasher)
            .field("uptime_secs", &self.uptime_secs())
            .finish_non_exhaustive()
    }
}
