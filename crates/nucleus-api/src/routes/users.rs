//! Account moderation routes

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::{post, put},
};
use nucleus_auth::{ADMINS, AuthError, CONTENT_EDITORS, require_auth, require_roles};
use nucleus_db::{Account, Role};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

use super::auth::CurrentUser;
use super::types::{AccountEnvelope, UpdateRoleRequest, UpdateStatusRequest};

async fn load_account(state: &AppState, id: i64) -> Result<Account, ApiError> {
    state
        .db
        .find_account_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Account {} not found", id)))
}

/// PUT /api/users/{id}/role (Admin only)
async fn update_role(
    CurrentUser(admin): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<AccountEnvelope>, ApiError> {
    let role: Role = request
        .role
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid role: {}", request.role)))?;

    if id == admin.id && role != Role::Admin {
        return Err(ApiError::BadRequest(
            "Cannot remove your own admin role".to_string(),
        ));
    }

    if !state.db.update_account_role(id, role).await? {
        return Err(ApiError::NotFound(format!("Account {} not found", id)));
    }

    info!("{} set role of account {} to {}", admin.username, id, role);

    Ok(Json(load_account(&state, id).await?.into()))
}

/// PUT /api/users/{id}/status (Moderator or Admin; admin accounts only by Admin)
async fn update_status(
    CurrentUser(moderator): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<AccountEnvelope>, ApiError> {
    if id == moderator.id {
        return Err(ApiError::BadRequest(
            "Cannot change the status of your own account".to_string(),
        ));
    }

    let account = load_account(&state, id).await?;
    if account.role == Role::Admin && !ADMINS.contains(moderator.role) {
        return Err(AuthError::InsufficientPermissions.into());
    }
    let mut status = account.status;

    if let Some(is_active) = request.is_active {
        status.is_active = is_active;
    }
    if let Some(is_banned) = request.is_banned {
        status.is_banned = is_banned;
        if !is_banned {
            status.ban_reason = None;
            status.ban_expires = None;
        }
    }
    if status.is_banned {
        if request.ban_reason.is_some() {
            status.ban_reason = request.ban_reason;
        }
        if request.ban_expires.is_some() {
            status.ban_expires = request.ban_expires;
        }
    }

    state.db.update_account_status(id, &status).await?;

    info!(
        "{} updated status of account {} (active: {}, banned: {})",
        moderator.username, id, status.is_active, status.is_banned
    );

    Ok(Json(load_account(&state, id).await?.into()))
}

/// POST /api/users/{id}/unlock (Admin only)
async fn unlock(
    CurrentUser(admin): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AccountEnvelope>, ApiError> {
    if !state.login.unlock(id).await? {
        return Err(ApiError::NotFound(format!("Account {} not found", id)));
    }

    info!("{} cleared lockout of account {}", admin.username, id);

    Ok(Json(load_account(&state, id).await?.into()))
}

/// Create account moderation routes
pub fn routes(state: &AppState) -> Router<AppState> {
    let admin_only = Router::new()
        .route("/api/users/{id}/role", put(update_role))
        .route("/api/users/{id}/unlock", post(unlock))
        .route_layer(from_fn_with_state(ADMINS, require_roles));

    let editors = Router::new()
        .route("/api/users/{id}/status", put(update_status))
        .route_layer(from_fn_with_state(CONTENT_EDITORS, require_roles));

    admin_only
        .merge(editors)
        .route_layer(from_fn_with_state(state.authenticator.clone(), require_auth))
}
