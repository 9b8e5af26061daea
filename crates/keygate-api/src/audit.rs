//! Security audit logging for authentication events
//!
//! Every login, registration, account change and guard rejection produces
//! one structured event. Events are logged at INFO level with the "audit"
//! target so they can be filtered and routed separately from application
//! logs:
//!
//! ```text
//! RUST_LOG=info,audit=info keygate-api
//! ```
//!
//! Passwords and tokens never appear in an event. Failed logins record the
//! attempted username and the internal reason; the client only ever sees
//! the unified credentials message.
//!
//! Author: hephaex@gmail.com

use axum::http::{header, HeaderMap};
use chrono::Utc;
use keygate_core::Role;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Client metadata attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful login
    LoginSuccess {
        user_id: Uuid,
        username: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Failed login, unknown username or wrong password
    LoginFailure {
        username: String,
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Self-service registration
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        role: Role,
        #[serde(flatten)]
        client: ClientInfo,
    },

    RegistrationFailure {
        username: String,
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Account created by an administrator
    AccountCreated {
        actor_id: Uuid,
        user_id: Uuid,
        username: String,
        role: Role,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Account deleted by an administrator
    AccountDeleted {
        actor_id: Uuid,
        user_id: Uuid,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Role guard rejected an authenticated caller
    AccessDenied {
        user_id: Uuid,
        username: String,
        role: Role,
        operation: String,
        #[serde(flatten)]
        client: ClientInfo,
    },

    /// Identity guard rejected a request
    InvalidToken {
        operation: String,
        reason: String,
        #[serde(flatten)]
        client: ClientInfo,
    },
}

impl AuditEvent {
    /// Human-readable summary used as the log message
    pub fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::AccountCreated { .. } => "Account created",
            AuditEvent::AccountDeleted { .. } => "Account deleted",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }

    pub fn client(&self) -> &ClientInfo {
        match self {
            AuditEvent::LoginSuccess { client, .. }
            | AuditEvent::LoginFailure { client, .. }
            | AuditEvent::RegistrationSuccess { client, .. }
            | AuditEvent::RegistrationFailure { client, .. }
            | AuditEvent::AccountCreated { client, .. }
            | AuditEvent::AccountDeleted { client, .. }
            | AuditEvent::AccessDenied { client, .. }
            | AuditEvent::InvalidToken { client, .. } => client,
        }
    }
}

/// Log a security audit event with structured fields
///
/// The event is also serialized to JSON in the `event` field for log
/// aggregators:
///
/// ```json
/// {
///   "event_type": "login_success",
///   "user_id": "550e8400-e29b-41d4-a716-446655440000",
///   "username": "alice",
///   "ip_address": "192.168.1.1",
///   "user_agent": "Mozilla/5.0..."
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    let client = event.client();

    match event {
        AuditEvent::LoginSuccess {
            user_id, username, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                ip_address = ?client.ip_address,
                "{}", event.summary()
            );
        }
        AuditEvent::LoginFailure {
            username, reason, ..
        }
        | AuditEvent::RegistrationFailure {
            username, reason, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?client.ip_address,
                "{}", event.summary()
            );
        }
        AuditEvent::RegistrationSuccess {
            user_id,
            username,
            role,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                role = %role,
                ip_address = ?client.ip_address,
                "{}", event.summary()
            );
        }
        AuditEvent::AccountCreated {
            actor_id,
            user_id,
            username,
            role,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                actor_id = %actor_id,
                user_id = %user_id,
                username = %username,
                role = %role,
                ip_address = ?client.ip_address,
                "{}", event.summary()
            );
        }
        AuditEvent::AccountDeleted {
            actor_id, user_id, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                actor_id = %actor_id,
                user_id = %user_id,
                ip_address = ?client.ip_address,
                "{}", event.summary()
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            username,
            role,
            operation,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                role = %role,
                operation = %operation,
                ip_address = ?client.ip_address,
                "{}", event.summary()
            );
        }
        AuditEvent::InvalidToken {
            operation, reason, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                operation = %operation,
                reason = %reason,
                ip_address = ?client.ip_address,
                "{}", event.summary()
            );
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For (first hop) then X-Real-IP. The socket address is
/// not consulted.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
