//! Guard middleware for protected routes
//!
//! Runs the operation's guard chain before the handler. On success the
//! verified `Identity` is added to the request extensions and can be
//! extracted in handlers with `Extension<Identity>`.

use super::guard::{AuthError, GuardChain, RequestContext};
use super::jwt::TokenService;
use super::policy::Operation;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::middleware::AuthMetrics;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Guard chain bound to one operation
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use keygate_api::auth::{enforce, Operation};
///
/// let app = Router::new()
///     .route("/user/all", get(list_users))
///     .route_layer(middleware::from_fn_with_state(
///         state.gate(Operation::ListUsers),
///         enforce,
///     ));
/// ```
#[derive(Debug, Clone)]
pub struct OperationGate {
    pub operation: Operation,
    pub chain: Arc<GuardChain>,
    pub tokens: Arc<TokenService>,
    pub metrics: Arc<AuthMetrics>,
}

impl OperationGate {
    pub fn new(operation: Operation, tokens: Arc<TokenService>, metrics: Arc<AuthMetrics>) -> Self {
        Self {
            operation,
            chain: Arc::new(GuardChain::for_operation(operation)),
            tokens,
            metrics,
        }
    }

    fn record_rejection(&self, err: &AuthError, ctx: &RequestContext, client: ClientInfo) {
        match err {
            AuthError::Unauthenticated(reason) => {
                self.metrics.record_unauthenticated();
                audit_log(&AuditEvent::InvalidToken {
                    operation: self.operation.to_string(),
                    reason: reason.to_string(),
                    client,
                });
            }
            AuthError::Forbidden { role, .. } => {
                self.metrics.record_forbidden();
                if let Some(identity) = &ctx.identity {
                    audit_log(&AuditEvent::AccessDenied {
                        user_id: identity.id,
                        username: identity.username.clone(),
                        role: *role,
                        operation: self.operation.to_string(),
                        client,
                    });
                }
            }
        }
    }
}

/// Guard middleware
///
/// The handler only runs when every guard in the chain passes.
pub async fn enforce(
    State(gate): State<OperationGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let mut ctx = RequestContext::from_headers(request.headers());

    if let Err(err) = gate.chain.run(&mut ctx, &gate.tokens) {
        let client = ClientInfo::from_headers(request.headers());
        gate.record_rejection(&err, &ctx, client);
        return Err(err);
    }

    if let Some(identity) = ctx.identity {
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}
