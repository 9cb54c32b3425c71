//! API routes

mod auth;
mod health;
pub mod types;
mod users;

use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

pub use auth::{CurrentUser, MaybeUser};

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Route not found"
        })),
    )
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes(&state))
        .merge(users::routes(&state))
        .fallback(not_found)
        .with_state(state)
}
