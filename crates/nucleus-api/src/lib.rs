//! Nucleus REST API
//!
//! This crate provides the Axum-based HTTP surface of the authentication
//! core: login, identity and account moderation endpoints.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
