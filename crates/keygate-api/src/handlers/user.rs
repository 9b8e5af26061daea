//! User account handlers
//!
//! Thin glue between HTTP and [`AuthService`](crate::auth::AuthService).
//! Access control happens in the guard middleware before any of these run;
//! protected handlers receive the verified identity as an extension.
//!
//! Bodies are taken as `Result<Json<_>, JsonRejection>` so that a malformed
//! body gets the same error format as every other failure.
//!
//! Author: hephaex@gmail.com

use crate::audit::ClientInfo;
use crate::auth::{LoginRequest, NewAccountRequest, RegisterRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use keygate_core::Identity;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Account deletion response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: Uuid,
    pub message: String,
}

/// `POST /user/login`
///
/// * `200 OK` - token and identity
/// * `401 Unauthorized` - unknown username or wrong password, same body
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let client = ClientInfo::from_headers(&headers);
    let response = state.auth_service().login(request, &client).await?;
    Ok(Json(response))
}

/// `POST /user/register`
///
/// * `201 Created` - the new account, always with role `user`
/// * `409 Conflict` - username taken
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let client = ClientInfo::from_headers(&headers);
    let identity = state.auth_service().register(request, &client).await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

/// `GET /user/me`
///
/// Current account as stored, not just the token contents.
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let current = state.auth_service().get_user(identity.id).await?;
    Ok(Json(current))
}

/// `GET /user/all`
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.auth_service().list_users().await?;
    Ok(Json(users))
}

/// `POST /user/create`
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    headers: HeaderMap,
    payload: Result<Json<NewAccountRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let client = ClientInfo::from_headers(&headers);
    let identity = state
        .auth_service()
        .create_user(&actor, request, &client)
        .await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

/// `DELETE /user/delete/:id`
///
/// * `400 Bad Request` - the caller's own id
/// * `404 Not Found` - no such account
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<Identity>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientInfo::from_headers(&headers);
    state.auth_service().delete_user(&actor, id, &client).await?;

    Ok(Json(DeleteResponse {
        id,
        message: "User deleted".to_string(),
    }))
}

/// `GET /user/id/:id`
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.auth_service().get_user(id).await?;
    Ok(Json(identity))
}
