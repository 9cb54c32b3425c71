//! Authentication and authorization middleware for Axum
//!
//! Composition on a protected route is always
//! `require_auth` → `require_roles(..)` → handler. Routes that only adapt
//! their output to the caller use `optional_auth` instead.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use nucleus_db::{Account, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::AuthError;
use crate::jwt::JwtManager;
use crate::store::CredentialStore;

/// Authenticated account, without credential material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&Account> for AuthUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role,
            last_login: account.last_login,
        }
    }
}

/// Extract bearer token from authorization header
fn extract_bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Resolves a bearer token to a live account
#[derive(Clone)]
pub struct Authenticator {
    jwt: Arc<JwtManager>,
    store: Arc<dyn CredentialStore>,
}

impl Authenticator {
    pub fn new(jwt: Arc<JwtManager>, store: Arc<dyn CredentialStore>) -> Self {
        Self { jwt, store }
    }

    /// Authenticate from the raw `Authorization` header value
    ///
    /// Token problems and unknown accounts are `Unauthenticated` class
    /// errors; an inactive or banned account is `AccountDisabled`.
    pub async fn authenticate(&self, auth_header: Option<&str>) -> Result<AuthUser, AuthError> {
        let header = auth_header.ok_or(AuthError::MissingToken)?;
        let token = extract_bearer_token(header)?;
        let claims = self.jwt.validate_token(token)?;
        let account_id = claims.subject_id()?;

        let account = self
            .store
            .find_account_by_id(account_id)
            .await
            .map_err(|e| {
                error!("Credential store lookup failed for account {}: {}", account_id, e);
                AuthError::Store(e)
            })?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.status.is_usable() {
            debug!("Rejected disabled account: {}", account.username);
            return Err(AuthError::AccountDisabled);
        }

        Ok(AuthUser::from(&account))
    }

    /// Like `authenticate`, but every failure means "anonymous"
    pub async fn authenticate_optional(&self, auth_header: Option<&str>) -> Option<AuthUser> {
        match self.authenticate(auth_header).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!("Continuing anonymously: {}", e);
                None
            }
        }
    }
}

fn auth_header(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
}

/// Mandatory authentication middleware
///
/// On success the `AuthUser` is added to request extensions.
pub async fn require_auth(
    State(authenticator): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticator.authenticate(auth_header(&request)).await?;

    debug!("Authenticated user: {} ({})", user.username, user.role);

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Optional authentication middleware; never rejects
pub async fn optional_auth(
    State(authenticator): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = authenticator
        .authenticate_optional(auth_header(&request))
        .await;

    if let Some(user) = user {
        debug!("Identified user: {} ({})", user.username, user.role);
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

/// Exact set of roles accepted by one protected operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(&'static [Role]);

impl RoleSet {
    pub const fn new(roles: &'static [Role]) -> Self {
        Self(roles)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn roles(&self) -> &'static [Role] {
        self.0
    }
}

/// Creating content
pub const CONTENT_CREATORS: RoleSet =
    RoleSet::new(&[Role::Contributor, Role::Moderator, Role::Admin]);

/// Editing content and moderating accounts
pub const CONTENT_EDITORS: RoleSet = RoleSet::new(&[Role::Moderator, Role::Admin]);

/// Destructive and administrative operations
pub const ADMINS: RoleSet = RoleSet::new(&[Role::Admin]);

/// Check an (optional) identity against a role set
pub fn authorize(user: Option<&AuthUser>, roles: RoleSet) -> Result<(), AuthError> {
    let user = user.ok_or(AuthError::AuthenticationRequired)?;

    if !roles.contains(user.role) {
        debug!(
            "Denied {} ({}): requires one of {:?}",
            user.username,
            user.role,
            roles.roles()
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(())
}

/// Middleware to require one of a set of roles
///
/// Must be layered inside `require_auth`.
pub async fn require_roles(
    State(roles): State<RoleSet>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(request.extensions().get::<AuthUser>(), roles)?;
    Ok(next.run(request).await)
}
