//! Authentication extractors and routes

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::request::Parts,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use nucleus_auth::{AuthError, AuthUser, optional_auth, require_auth};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{LoginRequest, LoginResponse, MeResponse, SessionResponse};

// ==================== Auth Extractors ====================

/// Identity attached by `require_auth`
///
/// Rejects when the route was not layered behind the authenticator.
pub struct CurrentUser(pub AuthUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ApiError::Auth(AuthError::AuthenticationRequired))
    }
}

/// Identity attached by `optional_auth`, if any
pub struct MaybeUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

// ==================== Input Validation ====================

/// Maximum allowed identifier length (longest valid email address)
const MAX_IDENTIFIER_LENGTH: usize = 254;
/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;

fn validate_login(request: &LoginRequest) -> Result<(), ApiError> {
    if request.identifier.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Username or email is required".to_string(),
        ));
    }
    if request.identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Username or email exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }
    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

// ==================== Auth Routes ====================

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_login(&request)?;

    debug!("Login attempt for: {}", request.identifier);

    let outcome = state
        .login
        .login(&request.identifier, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        success: true,
        token: outcome.token.token,
        expires_in: outcome.token.expires_in,
        user: outcome.user,
    }))
}

/// GET /api/auth/me
async fn me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        data: user,
    })
}

/// GET /api/auth/session
async fn session(MaybeUser(user): MaybeUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        success: true,
        authenticated: user.is_some(),
        user,
    })
}

/// Create auth routes
pub fn routes(state: &AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .route("/api/auth/me", get(me))
        .route_layer(from_fn_with_state(state.authenticator.clone(), require_auth));

    let anonymous_ok = Router::new()
        .route("/api/auth/session", get(session))
        .route_layer(from_fn_with_state(state.authenticator.clone(), optional_auth));

    Router::new()
        .route("/api/auth/login", post(login))
        .merge(authenticated)
        .merge(anonymous_ok)
}
