//! Credential store seam
//!
//! Authentication only needs a handful of account operations; they are
//! gathered here so the authenticator and login flow can run against any
//! backend. `Database` is the production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nucleus_db::{Account, Database, DbError, LockoutState};

use crate::lockout::LockoutPolicy;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_account_by_id(&self, id: i64) -> Result<Option<Account>, DbError>;

    /// Look up by username or email
    async fn find_account_by_login(&self, identifier: &str) -> Result<Option<Account>, DbError>;

    async fn update_lockout_state(&self, id: i64, state: LockoutState) -> Result<bool, DbError>;

    /// Apply `policy.after_failure` to the stored state as one atomic step
    /// and return the result (`None` if the account is gone)
    async fn record_failed_login(
        &self,
        id: i64,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> Result<Option<LockoutState>, DbError>;

    /// Reset lockout counters and stamp the login time
    async fn record_successful_login(&self, id: i64, now: DateTime<Utc>) -> Result<bool, DbError>;
}

#[async_trait]
impl CredentialStore for Database {
    async fn find_account_by_id(&self, id: i64) -> Result<Option<Account>, DbError> {
        Database::find_account_by_id(self, id).await
    }

    async fn find_account_by_login(&self, identifier: &str) -> Result<Option<Account>, DbError> {
        Database::find_account_by_login(self, identifier).await
    }

    async fn update_lockout_state(&self, id: i64, state: LockoutState) -> Result<bool, DbError> {
        Database::update_lockout_state(self, id, state).await
    }

    async fn record_failed_login(
        &self,
        id: i64,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> Result<Option<LockoutState>, DbError> {
        Database::record_failed_login(
            self,
            id,
            now,
            policy.max_failed_attempts,
            policy.lock_duration,
        )
        .await
    }

    async fn record_successful_login(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        Database::record_successful_login(self, id, now).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use nucleus_db::{NewAccount, Role};
    use tempfile::TempDir;

    pub(crate) async fn test_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("auth.db").display());
        let db = Database::new(&url).await.unwrap();
        (db, dir)
    }

    pub(crate) async fn insert(
        db: &Database,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Account {
        db.insert_account(NewAccount {
            username: username.to_string(),
            email: format!("{}@nucleus.test", username),
            password_hash: password_hash.to_string(),
            role,
        })
        .await
        .unwrap()
    }

    /// The SQL transition and the in-process state machine must agree
    #[tokio::test]
    async fn test_store_matches_state_machine() {
        let (db, _dir) = test_db().await;
        let account = insert(&db, "hahn", "hash", Role::Basic).await;
        let store: &dyn CredentialStore = &db;
        let policy = LockoutPolicy::new(3, Duration::minutes(30));
        let start = Utc::now();

        let times = [
            start,
            start + Duration::seconds(1),
            start + Duration::seconds(2),
            start + Duration::minutes(10),
            start + Duration::minutes(31),
            start + Duration::minutes(32),
        ];

        let mut expected = LockoutState::default();
        for now in times {
            expected = policy.after_failure(&expected, now);
            let stored = store
                .record_failed_login(account.id, now, &policy)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.failed_login_count, expected.failed_login_count);
            assert_eq!(
                stored.locked_until.map(|t| t.timestamp_millis()),
                expected.locked_until.map(|t| t.timestamp_millis())
            );
            // Keep millisecond precision in step with what the store holds
            expected = stored;
        }
    }
}
