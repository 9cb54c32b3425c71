//! Nucleus Authentication and Authorization
//!
//! This crate provides JWT-based authentication, brute-force lockout
//! for password logins and role-based access control for Nucleus.

pub mod clock;
pub mod error;
pub mod jwt;
pub mod lockout;
pub mod login;
pub mod middleware;
pub mod password;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthError;
pub use jwt::{Claims, IssuedToken, JwtManager};
pub use lockout::LockoutPolicy;
pub use login::{LoginOutcome, LoginService};
pub use middleware::{
    ADMINS, AuthUser, Authenticator, CONTENT_CREATORS, CONTENT_EDITORS, RoleSet, authorize,
    optional_auth, require_auth, require_roles,
};
pub use password::{hash_password, verify_password};
pub use store::CredentialStore;
