//! Account operations

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;

use crate::error::DbError;
use crate::models::{Account, AccountStatus, LockoutState, NewAccount, Role};
use crate::repository::Database;
use crate::utils::to_millis;

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, role, is_active, is_banned, \
     ban_reason, ban_expires, failed_login_count, locked_until, last_login, created_at, updated_at";

impl Database {
    // ==================== Account Operations ====================

    /// Insert a new account
    pub async fn insert_account(&self, account: NewAccount) -> Result<Account, DbError> {
        let now = Utc::now();
        let email = account.email.trim().to_lowercase();

        if self.find_account_by_login(&account.username).await?.is_some()
            || self.find_account_by_login(&email).await?.is_some()
        {
            return Err(DbError::Duplicate(format!(
                "Account '{}' already exists",
                account.username
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO accounts (username, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&account.username)
        .bind(&email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        Ok(Account {
            id,
            username: account.username,
            email,
            password_hash: account.password_hash,
            role: account.role,
            status: AccountStatus::default(),
            lockout: LockoutState::default(),
            last_login: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get an account by ID
    pub async fn find_account_by_id(&self, id: i64) -> Result<Option<Account>, DbError> {
        let result = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result
            .map(|row| Account::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Get an account by username or email
    pub async fn find_account_by_login(&self, identifier: &str) -> Result<Option<Account>, DbError> {
        let identifier = identifier.trim();
        let result = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ? OR email = ?"
        ))
        .bind(identifier)
        .bind(identifier.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| Account::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Overwrite the lockout counters of an account
    pub async fn update_lockout_state(&self, id: i64, state: LockoutState) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_count = ?, locked_until = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(i64::from(state.failed_login_count))
        .bind(state.locked_until.map(to_millis))
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed password check in a single statement
    ///
    /// Semantics, evaluated against the row as it was before the update:
    /// - lock still in force: nothing changes
    /// - lock expired: the counter restarts at 1 and the lock is cleared
    /// - otherwise: the counter is incremented
    ///
    /// In the last two cases the account is locked until `now + lock_duration`
    /// once the counter reaches `max_attempts`. Returns the new state, or
    /// `None` if the account does not exist.
    pub async fn record_failed_login(
        &self,
        id: i64,
        now: DateTime<Utc>,
        max_attempts: u32,
        lock_duration: Duration,
    ) -> Result<Option<LockoutState>, DbError> {
        let now_ms = to_millis(now);
        let lock_until_ms = to_millis(now + lock_duration);
        let max_attempts = i64::from(max_attempts);

        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_count = CASE
                    WHEN locked_until IS NOT NULL AND locked_until > ? THEN failed_login_count
                    WHEN locked_until IS NOT NULL THEN 1
                    ELSE failed_login_count + 1
                END,
                locked_until = CASE
                    WHEN locked_until IS NOT NULL AND locked_until > ? THEN locked_until
                    WHEN locked_until IS NOT NULL THEN
                        CASE WHEN 1 >= ? THEN ? ELSE NULL END
                    WHEN failed_login_count + 1 >= ? THEN ?
                    ELSE NULL
                END,
                updated_at = ?
            WHERE id = ?
            RETURNING failed_login_count, locked_until
            "#,
        )
        .bind(now_ms)
        .bind(now_ms)
        .bind(max_attempts)
        .bind(lock_until_ms)
        .bind(max_attempts)
        .bind(lock_until_ms)
        .bind(now.to_rfc3339())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| LockoutState::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Clear the lockout counters and stamp the login time
    pub async fn record_successful_login(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_count = 0, locked_until = NULL, last_login = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update account role
    pub async fn update_account_role(&self, id: i64, role: Role) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET role = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(role.as_str())
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update account status flags
    pub async fn update_account_status(
        &self,
        id: i64,
        status: &AccountStatus,
    ) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET is_active = ?, is_banned = ?, ban_reason = ?, ban_expires = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.is_active)
        .bind(status.is_banned)
        .bind(&status.ban_reason)
        .bind(status.ban_expires.map(to_millis))
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any accounts exist
    pub async fn has_accounts(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
        let db = Database::new(&url).await.unwrap();
        (db, dir)
    }

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: format!("{}@Example.org", username),
            password_hash: "hash".to_string(),
            role: Role::Contributor,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (db, _dir) = test_db().await;
        assert!(!db.has_accounts().await.unwrap());

        let account = db.insert_account(new_account("fermi")).await.unwrap();
        assert_eq!(account.email, "fermi@example.org");
        assert!(db.has_accounts().await.unwrap());

        let by_id = db.find_account_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "fermi");
        assert_eq!(by_id.role, Role::Contributor);
        assert!(by_id.status.is_active);
        assert_eq!(by_id.lockout, LockoutState::default());

        let by_email = db
            .find_account_by_login("FERMI@example.org")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, account.id);

        assert!(db.find_account_by_id(account.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_account() {
        let (db, _dir) = test_db().await;
        db.insert_account(new_account("szilard")).await.unwrap();
        let result = db.insert_account(new_account("szilard")).await;
        assert!(matches!(result, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_record_failed_login_locks_at_threshold() {
        let (db, _dir) = test_db().await;
        let account = db.insert_account(new_account("meitner")).await.unwrap();
        let now = Utc::now();
        let lock = Duration::hours(2);

        for expected in 1..=4 {
            let state = db
                .record_failed_login(account.id, now, 5, lock)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(state.failed_login_count, expected);
            assert!(state.locked_until.is_none());
        }

        let state = db
            .record_failed_login(account.id, now, 5, lock)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.failed_login_count, 5);
        assert_eq!(
            state.locked_until.map(|t| t.timestamp_millis()),
            Some((now + lock).timestamp_millis())
        );

        // Further failures while locked leave the state alone
        let later = now + Duration::minutes(30);
        let unchanged = db
            .record_failed_login(account.id, later, 5, lock)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged, state);
    }

    #[tokio::test]
    async fn test_record_failed_login_after_expiry_restarts() {
        let (db, _dir) = test_db().await;
        let account = db.insert_account(new_account("bohr")).await.unwrap();
        let now = Utc::now();
        db.update_lockout_state(
            account.id,
            LockoutState {
                failed_login_count: 5,
                locked_until: Some(now - Duration::seconds(1)),
            },
        )
        .await
        .unwrap();

        let state = db
            .record_failed_login(account.id, now, 5, Duration::hours(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.failed_login_count, 1);
        assert!(state.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_record_failed_login_missing_account() {
        let (db, _dir) = test_db().await;
        let state = db
            .record_failed_login(42, Utc::now(), 5, Duration::hours(2))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_record_successful_login_resets() {
        let (db, _dir) = test_db().await;
        let account = db.insert_account(new_account("curie")).await.unwrap();
        let now = Utc::now();
        db.record_failed_login(account.id, now, 5, Duration::hours(2))
            .await
            .unwrap();

        assert!(db.record_successful_login(account.id, now).await.unwrap());
        let account = db.find_account_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(account.lockout, LockoutState::default());
        assert!(account.last_login.is_some());
    }

    #[tokio::test]
    async fn test_update_role_and_status() {
        let (db, _dir) = test_db().await;
        let account = db.insert_account(new_account("oppenheimer")).await.unwrap();

        assert!(db.update_account_role(account.id, Role::Admin).await.unwrap());
        let status = AccountStatus {
            is_active: true,
            is_banned: true,
            ban_reason: Some("spam".to_string()),
            ban_expires: None,
        };
        assert!(db.update_account_status(account.id, &status).await.unwrap());

        let account = db.find_account_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(account.role, Role::Admin);
        assert_eq!(account.status, status);

        assert!(!db.update_account_role(999, Role::Admin).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_failures_lock_exactly_once() {
        let (db, _dir) = test_db().await;
        let account = db.insert_account(new_account("szilard")).await.unwrap();
        let now = Utc::now();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.record_failed_login(account.id, now, 5, Duration::hours(2))
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        let state = db
            .find_account_by_id(account.id)
            .await
            .unwrap()
            .unwrap()
            .lockout;
        assert_eq!(state.failed_login_count, 5);
        assert!(state.is_locked_at(now));
        assert_eq!(
            state.locked_until.map(|t| t.timestamp_millis()),
            Some((now + Duration::hours(2)).timestamp_millis())
        );
    }
}
