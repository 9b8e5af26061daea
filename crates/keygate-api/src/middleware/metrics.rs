//! Authentication metrics
//!
//! In-process counters for logins, registrations and guard rejections,
//! plus a middleware that counts every request by status class.
//!
//! Author: hephaex@gmail.com

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Authentication counters shared across requests
#[derive(Debug, Default)]
pub struct AuthMetrics {
    requests_total: AtomicU64,
    responses_client_error: AtomicU64,
    responses_server_error: AtomicU64,
    logins_succeeded: AtomicU64,
    logins_failed: AtomicU64,
    registrations: AtomicU64,
    accounts_created: AtomicU64,
    accounts_deleted: AtomicU64,
    rejected_unauthenticated: AtomicU64,
    rejected_forbidden: AtomicU64,
}

/// Point-in-time copy of [`AuthMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub responses_client_error: u64,
    pub responses_server_error: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub registrations: u64,
    pub accounts_created: u64,
    pub accounts_deleted: u64,
    pub rejected_unauthenticated: u64,
    pub rejected_forbidden: u64,
}

impl AuthMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, status: u16) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        match status {
            400..=499 => {
                self.responses_client_error.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.responses_server_error.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn record_login(&self, success: bool) {
        let counter = if success {
            &self.logins_succeeded
        } else {
            &self.logins_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_account_created(&self) {
        self.accounts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_account_deleted(&self) {
        self.accounts_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unauthenticated(&self) {
        self.rejected_unauthenticated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forbidden(&self) {
        self.rejected_forbidden.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            responses_client_error: self.responses_client_error.load(Ordering::Relaxed),
            responses_server_error: self.responses_server_error.load(Ordering::Relaxed),
            logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            accounts_created: self.accounts_created.load(Ordering::Relaxed),
            accounts_deleted: self.accounts_deleted.load(Ordering::Relaxed),
            rejected_unauthenticated: self.rejected_unauthenticated.load(Ordering::Relaxed),
            rejected_forbidden: self.rejected_forbidden.load(Ordering::Relaxed),
        }
    }
}

/// Request counting middleware
///
/// Counts every response, including guard rejections, by status class.
pub async fn metrics_middleware(
    State(metrics): State<Arc<AuthMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    metrics.record_request(response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        let metrics = AuthMetrics::new();
        metrics.record_request(200);
        metrics.record_request(401);
        metrics.record_request(403);
        metrics.record_request(500);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 4);
        assert_eq!(snapshot.responses_client_error, 2);
        assert_eq!(snapshot.responses_server_error, 1);
    }

    #[test]
    fn test_auth_counters() {
        let metrics = AuthMetrics::new();
        metrics.record_login(true);
        metrics.record_login(false);
        metrics.record_login(false);
        metrics.record_registration();
        metrics.record_account_created();
        metrics.record_account_deleted();
        metrics.record_unauthenticated();
        metrics.record_forbidden();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.logins_succeeded, 1);
        assert_eq!(snapshot.logins_failed, 2);
        assert_eq!(snapshot.registrations, 1);
        assert_eq!(snapshot.accounts_created, 1);
        assert_eq!(snapshot.accounts_deleted, 1);
        assert_eq!(snapshot.rejected_unauthenticated, 1);
        assert_eq!(snapshot.rejected_forbidden, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(AuthMetrics::new().snapshot()).unwrap();
        assert_eq!(json["requests_total"], 0);
        assert_eq!(json["rejected_forbidden"], 0);
    }
}
