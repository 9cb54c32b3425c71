//! Database models

use crate::utils::{from_millis, parse_datetime_or_now};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Error type for parsing models from strings
#[derive(Debug, Clone)]
pub enum ParseError {
    InvalidRole(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidRole(s) => write!(f, "Invalid role: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// Account role
///
/// A closed set of capability tiers. There is no ordering between roles:
/// every protected operation names the exact roles it accepts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[serde(rename = "user", alias = "basic")]
    Basic,
    Contributor,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Basic => "user",
            Role::Contributor => "contributor",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "basic" => Ok(Role::Basic),
            "contributor" => Ok(Role::Contributor),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseError::InvalidRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account status flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountStatus {
    pub is_active: bool,
    pub is_banned: bool,
    pub ban_reason: Option<String>,
    /// Informational; an expired ban still blocks until a moderator lifts it
    pub ban_expires: Option<DateTime<Utc>>,
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self {
            is_active: true,
            is_banned: false,
            ban_reason: None,
            ban_expires: None,
        }
    }
}

impl AccountStatus {
    /// Whether the account may be used
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_banned
    }
}

/// Brute-force lockout counters of an account
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_login_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    /// Locked iff `locked_until` is present and still in the future
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// A lock was set and has since run out
    pub fn lock_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until <= now)
    }
}

/// Account model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    #[serde(skip_serializing)]
    pub lockout: LockoutState,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New account (for insertion)
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

// ==================== TryFrom Implementations ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for LockoutState {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let count: i64 = row.try_get("failed_login_count")?;
        Ok(LockoutState {
            failed_login_count: u32::try_from(count).unwrap_or(0),
            locked_until: from_millis(row.try_get("locked_until")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Account {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let role_str: String = row.try_get("role")?;
        let last_login: Option<String> = row.try_get("last_login")?;
        Ok(Account {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: Role::from_str(&role_str).unwrap_or_default(),
            status: AccountStatus {
                is_active: row.try_get("is_active")?,
                is_banned: row.try_get("is_banned")?,
                ban_reason: row.try_get("ban_reason")?,
                ban_expires: from_millis(row.try_get("ban_expires")?),
            },
            lockout: LockoutState::try_from(row)?,
            last_login: last_login.as_deref().map(parse_datetime_or_now),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}
