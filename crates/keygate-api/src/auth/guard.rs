//! Identity and role guards
//!
//! A protected request passes through two stages:
//!
//! 1. The identity guard reads the `Authorization: Bearer <token>` header,
//!    verifies the token and records the resulting [`Identity`] on the
//!    request context.
//! 2. The role guard compares that identity's role with the operation's
//!    [`RoleRequirement`].
//!
//! The role guard reads state the identity guard writes, so the order is
//! fixed: a [`GuardChain`] can only be built through [`GuardChain::for_access`]
//! or [`GuardChain::for_operation`], which always place the identity guard
//! first. A role guard that finds no identity fails closed.

use super::jwt::{TokenError, TokenService};
use super::policy::{Access, Operation, RoleRequirement};
use crate::error::AppError;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use keygate_core::{Identity, Role};
use std::fmt;
use thiserror::Error;

/// Why the identity guard rejected a request. Logged, never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    MissingCredentials,
    InvalidScheme,
    Token(TokenError),
    /// Role guard ran without an identity on the context
    MissingIdentity,
}

impl fmt::Display for UnauthenticatedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnauthenticatedReason::MissingCredentials => f.write_str("missing_credentials"),
            UnauthenticatedReason::InvalidScheme => f.write_str("invalid_scheme"),
            UnauthenticatedReason::Token(err) => f.write_str(err.kind()),
            UnauthenticatedReason::MissingIdentity => f.write_str("missing_identity"),
        }
    }
}

/// Guard rejection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(UnauthenticatedReason),

    #[error("Role {role} does not satisfy {required}")]
    Forbidden {
        role: Role,
        required: RoleRequirement,
    },
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Per-request state the guards read and write
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Raw `Authorization` header value
    pub authorization: Option<String>,
    /// Set by the identity guard
    pub identity: Option<Identity>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

        Self {
            authorization,
            identity: None,
        }
    }

    pub fn with_authorization(value: impl Into<String>) -> Self {
        Self {
            authorization: Some(value.into()),
            identity: None,
        }
    }
}

/// Extract the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively. Anything other than
/// `Bearer <token>` is rejected.
pub fn bearer_token(header_value: &str) -> Result<&str, UnauthenticatedReason> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or(UnauthenticatedReason::InvalidScheme)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(UnauthenticatedReason::InvalidScheme);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(UnauthenticatedReason::MissingCredentials);
    }

    Ok(token)
}

/// Identity guard
///
/// Verifies the bearer token and records the identity on the context.
/// Running it twice yields the same identity.
pub fn authenticate(ctx: &mut RequestContext, tokens: &TokenService) -> Result<(), AuthError> {
    let header_value = ctx
        .authorization
        .as_deref()
        .ok_or(AuthError::Unauthenticated(
            UnauthenticatedReason::MissingCredentials,
        ))?;

    let token = bearer_token(header_value).map_err(AuthError::Unauthenticated)?;

    let identity = tokens
        .verify(token)
        .map_err(|e| AuthError::Unauthenticated(UnauthenticatedReason::Token(e)))?;

    ctx.identity = Some(identity);
    Ok(())
}

/// Role guard
pub fn authorize(ctx: &RequestContext, required: &RoleRequirement) -> Result<(), AuthError> {
    let identity = ctx.identity.as_ref().ok_or(AuthError::Unauthenticated(
        UnauthenticatedReason::MissingIdentity,
    ))?;

    if required.allows(identity.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            role: identity.role,
            required: *required,
        })
    }
}

/// A single stage of a guard chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Identity,
    Role(RoleRequirement),
}

impl Guard {
    fn check(&self, ctx: &mut RequestContext, tokens: &TokenService) -> Result<(), AuthError> {
        match self {
            Guard::Identity => authenticate(ctx, tokens),
            Guard::Role(required) => authorize(ctx, required),
        }
    }
}

/// Ordered guards for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardChain {
    guards: Vec<Guard>,
}

impl GuardChain {
    pub fn for_access(access: Access) -> Self {
        let guards = match access {
            Access::Public => vec![],
            Access::Authenticated => vec![Guard::Identity],
            Access::Roles(required) => vec![Guard::Identity, Guard::Role(required)],
        };
        Self { guards }
    }

    pub fn for_operation(operation: Operation) -> Self {
        Self::for_access(operation.access())
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Run every guard in order, stopping at the first rejection
    pub fn run(&self, ctx: &mut RequestContext, tokens: &TokenService) -> Result<(), AuthError> {
        for guard in &self.guards {
            guard.check(ctx, tokens)?;
        }
        Ok(())
    }
}
