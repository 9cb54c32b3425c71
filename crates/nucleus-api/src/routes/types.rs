//! Request/Response DTOs

use chrono::{DateTime, Utc};
use nucleus_auth::AuthUser;
use nucleus_db::{Account, Role};
use serde::{Deserialize, Serialize};

// ==================== Auth Types ====================

/// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub identifier: String,
    pub password: String,
}

/// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub expires_in: i64,
    pub user: AuthUser,
}

/// Current identity
#[derive(Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub data: AuthUser,
}

/// Identity if the caller presented a usable token
#[derive(Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub authenticated: bool,
    pub user: Option<AuthUser>,
}

// ==================== Account Types ====================

/// Update role request
#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// Update status request; absent fields are left unchanged
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub is_active: Option<bool>,
    pub is_banned: Option<bool>,
    pub ban_reason: Option<String>,
    pub ban_expires: Option<DateTime<Utc>>,
}

/// Account as seen by moderators (without password hash)
#[derive(Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
    pub ban_expires: Option<DateTime<Utc>>,
    pub failed_login_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            role: account.role,
            is_active: account.status.is_active,
            is_banned: account.status.is_banned,
            ban_reason: account.status.ban_reason,
            ban_expires: account.status.ban_expires,
            failed_login_count: account.lockout.failed_login_count,
            locked_until: account.lockout.locked_until,
            last_login: account.last_login,
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

/// Envelope for single-account responses
#[derive(Serialize)]
pub struct AccountEnvelope {
    pub success: bool,
    pub data: AccountResponse,
}

impl From<Account> for AccountEnvelope {
    fn from(account: Account) -> Self {
        Self {
            success: true,
            data: account.into(),
        }
    }
}
