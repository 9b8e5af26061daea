//! API Integration Tests
//!
//! Drive the full router, guards included, with in-memory state.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use keygate_api::{create_router, state::AppState};
use keygate_core::{Identity, Role};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const ADMIN_USERNAME: &str = "root";
const ADMIN_PASSWORD: &str = "rootpass";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

impl TestApp {
    /// Fresh state with a seeded admin account
    async fn new() -> Self {
        let state = Arc::new(AppState::for_testing());
        state
            .auth_service()
            .ensure_admin(ADMIN_USERNAME, ADMIN_PASSWORD)
            .await
            .unwrap();

        Self {
            router: create_router(state.clone()),
            state,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> Response {
        self.send(json_request(
            "POST",
            "/user/login",
            None,
            json!({"username": username, "password": password}),
        ))
        .await
    }

    async fn token_for(&self, username: &str, password: &str) -> String {
        let response = self.login(username, password).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn admin_token(&self) -> String {
        self.token_for(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    async fn register(&self, username: &str, password: &str, role: Option<&str>) -> Response {
        let mut body = json!({"username": username, "password": password});
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        self.send(json_request("POST", "/user/register", None, body))
            .await
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let response = app.send(empty_request("GET", "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

// =============================================================================
// Registration and login
// =============================================================================

#[tokio::test]
async fn test_registration_ignores_requested_role() {
    let app = TestApp::new().await;

    let response = app.register("alice", "secret1", Some("admin")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["username"], "alice");
    assert_eq!(json["role"], "user");
    assert!(json.get("password_hash").is_none());

    let response = app.login("alice", "secret1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["role"], "user");
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 3600);

    let identity = app
        .state
        .tokens
        .verify(json["token"].as_str().unwrap())
        .unwrap();
    assert_eq!(identity.role, Role::User);
    assert_eq!(identity.username, "alice");
}

#[tokio::test]
async fn test_registration_ignores_any_role_value() {
    let app = TestApp::new().await;

    for (i, role) in [json!("Admin"), json!("superadmin"), json!(1), json!({"name": "admin"})]
        .into_iter()
        .enumerate()
    {
        let username = format!("user{i}");
        let body = json!({"username": username, "password": "secret1", "role": role});
        let response = app
            .send(json_request("POST", "/user/register", None, body))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "role {role}");
        assert_eq!(body_json(response).await["role"], "user", "role {role}");
    }
}

#[tokio::test]
async fn test_malformed_body_uses_error_format() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/user/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let response = app
        .send(json_request(
            "POST",
            "/user/register",
            None,
            json!({"username": "alice"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let token = app.admin_token().await;
    let response = app
        .send(json_request(
            "POST",
            "/user/create",
            Some(&token),
            json!({"username": "bob", "password": "secret1", "role": "superadmin"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new().await;

    assert_eq!(
        app.register("alice", "secret1", None).await.status(),
        StatusCode::CREATED
    );
    let response = app.register("alice", "secret2", None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn test_short_password_rejected() {
    let app = TestApp::new().await;

    let response = app.register("alice", "12345", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new().await;
    app.register("alice", "secret1", None).await;

    let unknown = app.login("ghost", "secret1").await;
    let wrong = app.login("alice", "not-the-password").await;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let unknown = body_json(unknown).await;
    let wrong = body_json(wrong).await;
    assert_eq!(unknown, wrong);
    assert_eq!(unknown["message"], "Invalid username or password");
}

// =============================================================================
// Identity guard
// =============================================================================

#[tokio::test]
async fn test_me_requires_token() {
    let app = TestApp::new().await;

    let response = app.send(empty_request("GET", "/user/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
}

#[tokio::test]
async fn test_me_returns_identity() {
    let app = TestApp::new().await;
    app.register("alice", "secret1", None).await;
    let token = app.token_for("alice", "secret1").await;

    let response = app.send(empty_request("GET", "/user/me", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["username"], "alice");
    assert_eq!(json["role"], "user");
}

#[tokio::test]
async fn test_token_failures_share_one_response() {
    let app = TestApp::new().await;
    let identity = Identity::new(Uuid::new_v4(), "alice", Role::User);

    let expired = app.state.tokens.issue_at(&identity, 1_000_000_000).unwrap();
    let valid = app.state.tokens.issue(&identity).unwrap();
    let mut tampered = valid.clone();
    tampered.pop();
    tampered.push(if valid.ends_with('A') { 'B' } else { 'A' });

    let mut bodies = Vec::new();
    for token in [expired.as_str(), tampered.as_str(), "garbage"] {
        let response = app.send(empty_request("GET", "/user/me", Some(token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{token}");
        bodies.push(body_json(response).await);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
    assert_eq!(bodies[0]["code"], "UNAUTHORIZED");
}

// =============================================================================
// Role guard
// =============================================================================

#[tokio::test]
async fn test_user_forbidden_on_admin_operations() {
    let app = TestApp::new().await;
    app.register("alice", "secret1", None).await;
    let token = app.token_for("alice", "secret1").await;
    let target = Uuid::new_v4();

    let requests = vec![
        empty_request("GET", "/user/all", Some(&token)),
        empty_request("GET", &format!("/user/id/{target}"), Some(&token)),
        empty_request("DELETE", &format!("/user/delete/{target}"), Some(&token)),
        empty_request("GET", "/metrics", Some(&token)),
        json_request(
            "POST",
            "/user/create",
            Some(&token),
            json!({"username": "mallory", "password": "secret1"}),
        ),
    ];

    for request in requests {
        let uri = request.uri().to_string();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }

    assert_eq!(app.state.metrics.snapshot().rejected_forbidden, 5);
}

#[tokio::test]
async fn test_admin_operations_without_token_are_unauthenticated() {
    let app = TestApp::new().await;

    let response = app.send(empty_request("GET", "/user/all", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_lists_and_gets_users() {
    let app = TestApp::new().await;
    let response = app.register("alice", "secret1", None).await;
    let alice_id = body_json(response).await["id"].as_str().unwrap().to_string();
    let token = app.admin_token().await;

    let response = app.send(empty_request("GET", "/user/all", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let users = body_json(response).await;
    let names: Vec<&str> = users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec![ADMIN_USERNAME, "alice"]);

    let response = app
        .send(empty_request("GET", &format!("/user/id/{alice_id}"), Some(&token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "alice");

    let response = app
        .send(empty_request(
            "GET",
            &format!("/user/id/{}", Uuid::new_v4()),
            Some(&token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_creates_admin() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    let response = app
        .send(json_request(
            "POST",
            "/user/create",
            Some(&token),
            json!({"username": "second", "password": "secret1", "role": "admin"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["role"], "admin");

    let second = app.token_for("second", "secret1").await;
    let response = app.send(empty_request("GET", "/user/all", Some(&second))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;
    let admin = app.state.tokens.verify(&token).unwrap();

    let response = app
        .send(empty_request(
            "DELETE",
            &format!("/user/delete/{}", admin.id),
            Some(&token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "You cannot delete your own account"
    );

    // Still there
    let response = app.send(empty_request("GET", "/user/me", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_deletes_user() {
    let app = TestApp::new().await;
    let response = app.register("alice", "secret1", None).await;
    let alice_id = body_json(response).await["id"].as_str().unwrap().to_string();
    let alice_token = app.token_for("alice", "secret1").await;
    let token = app.admin_token().await;

    let uri = format!("/user/delete/{alice_id}");
    let response = app.send(empty_request("DELETE", &uri, Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(empty_request("DELETE", &uri, Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The token stays valid but the account is gone
    let response = app
        .send(empty_request("GET", "/user/me", Some(&alice_token)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.login("alice", "secret1").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_counts_auth_events() {
    let app = TestApp::new().await;
    app.register("alice", "secret1", None).await;
    app.login("alice", "wrong-password").await;
    app.send(empty_request("GET", "/user/me", None)).await;
    let token = app.admin_token().await;

    let response = app.send(empty_request("GET", "/metrics", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["registrations"], 1);
    assert_eq!(json["logins_failed"], 1);
    assert_eq!(json["logins_succeeded"], 1);
    assert_eq!(json["rejected_unauthenticated"], 1);
    assert!(json["requests_total"].as_u64().unwrap() >= 4);
}
