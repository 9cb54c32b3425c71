//! Authentication error types
//!
//! Variants are fine grained for logging, but the response only reveals
//! the class of failure. A locked account answers exactly like a wrong
//! password, and a missing token like a forged one.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nucleus_db::DbError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingToken,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Account referenced by token not found")]
    AccountNotFound,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive or banned")]
    AccountDisabled,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Token signing error: {0}")]
    TokenIssue(#[source] jsonwebtoken::errors::Error),

    #[error("Credential store error: {0}")]
    Store(#[from] DbError),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::AccountDisabled | AuthError::InsufficientPermissions => {
                StatusCode::FORBIDDEN
            }
            AuthError::TokenIssue(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to return to the caller
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken
            | AuthError::AccountNotFound => "Invalid or missing token.",
            AuthError::AuthenticationRequired => "Authentication required.",
            AuthError::InvalidCredentials => "Invalid credentials.",
            AuthError::AccountDisabled => "Account is inactive or banned.",
            AuthError::InsufficientPermissions => "Insufficient permissions.",
            AuthError::PasswordHash(_) | AuthError::Store(_) => "Authentication failed.",
            AuthError::TokenIssue(_) => "Internal error.",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = axum::Json(json!({
            "success": false,
            "message": self.public_message()
        }));

        (self.status_code(), body).into_response()
    }
}
