//! API route definitions
//!
//! Each route is registered with the operation it serves. Operations whose
//! access is not `Public` get the guard middleware for that operation.
//!
//! Author: hephaex@gmail.com

use crate::auth::{enforce, GuardChain, Operation};
use crate::handlers::{health, user};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, MethodRouter},
    Router,
};
use std::sync::Arc;

/// Register one route, wrapped with its operation's guards
fn operation_route(
    state: &AppState,
    operation: Operation,
    path: &str,
    method_router: MethodRouter<Arc<AppState>>,
) -> Router<Arc<AppState>> {
    let router = Router::new().route(path, method_router);

    if GuardChain::for_operation(operation).is_empty() {
        router
    } else {
        router.route_layer(middleware::from_fn_with_state(
            state.gate(operation),
            enforce,
        ))
    }
}

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<Arc<AppState>> {
    let routes: [(Operation, &str, MethodRouter<Arc<AppState>>); 9] = [
        (Operation::Login, "/user/login", post(user::login_handler)),
        (Operation::Register, "/user/register", post(user::register_handler)),
        (Operation::Me, "/user/me", get(user::me_handler)),
        (Operation::ListUsers, "/user/all", get(user::list_users_handler)),
        (Operation::CreateUser, "/user/create", post(user::create_user_handler)),
        (Operation::DeleteUser, "/user/delete/:id", delete(user::delete_user_handler)),
        (Operation::GetUser, "/user/id/:id", get(user::get_user_handler)),
        (Operation::Health, "/health", get(health::health_check)),
        (Operation::Metrics, "/metrics", get(health::metrics)),
    ];

    routes
        .into_iter()
        .fold(Router::new(), |router, (operation, path, method_router)| {
            router.merge(operation_route(state, operation, path, method_router))
        })
}
