//! Password login
//!
//! Every refusal caused by the caller's input is `InvalidCredentials`:
//! unknown identifier, wrong password and locked account look the same
//! from outside. Only a correct password on an unusable account gets the
//! more specific `AccountDisabled`.

use nucleus_db::DbError;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::AuthError;
use crate::jwt::{IssuedToken, JwtManager};
use crate::lockout::LockoutPolicy;
use crate::middleware::AuthUser;
use crate::password::{DUMMY_HASH, verify_password_blocking};
use crate::store::CredentialStore;

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    pub user: AuthUser,
}

#[derive(Clone)]
pub struct LoginService {
    store: Arc<dyn CredentialStore>,
    jwt: Arc<JwtManager>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl LoginService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        jwt: Arc<JwtManager>,
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            jwt,
            policy,
            clock,
        }
    }

    /// Clear failed attempts and any lock; `false` if the account is gone
    pub async fn unlock(&self, account_id: i64) -> Result<bool, DbError> {
        let cleared = self.policy.after_success();
        let updated = self.store.update_lockout_state(account_id, cleared).await?;
        if updated {
            info!("Lockout cleared for account {}", account_id);
        }
        Ok(updated)
    }

    /// Authenticate with username (or email) and password
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let now = self.clock.now();

        let account = self
            .store
            .find_account_by_login(identifier)
            .await
            .map_err(|e| {
                error!("Credential store lookup failed during login: {}", e);
                AuthError::Store(e)
            })?;

        let Some(account) = account else {
            // Spend the same time as a real verification
            let _ = verify_password_blocking(password, DUMMY_HASH).await;
            debug!("Login failed: unknown identifier");
            return Err(AuthError::InvalidCredentials);
        };

        if self.policy.is_locked(&account.lockout, now) {
            warn!(
                "Login refused for locked account {} (locked until {:?})",
                account.username, account.lockout.locked_until
            );
            return Err(AuthError::InvalidCredentials);
        }

        let password_valid = match verify_password_blocking(password, &account.password_hash).await
        {
            Ok(valid) => valid,
            Err(e) => {
                error!("Stored hash for account {} is unusable: {}", account.username, e);
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !password_valid {
            let state = self
                .store
                .record_failed_login(account.id, now, &self.policy)
                .await
                .map_err(|e| {
                    error!("Failed to record failed login for {}: {}", account.username, e);
                    AuthError::Store(e)
                })?;

            match state {
                Some(state) if state.is_locked_at(now) => warn!(
                    "Account {} locked after {} failed attempts",
                    account.username, state.failed_login_count
                ),
                Some(state) => debug!(
                    "Login failed for {} ({} failed attempts)",
                    account.username, state.failed_login_count
                ),
                None => debug!("Account {} vanished during login", account.username),
            }
            return Err(AuthError::InvalidCredentials);
        }

        if !account.status.is_usable() {
            debug!("Login refused for disabled account {}", account.username);
            return Err(AuthError::AccountDisabled);
        }

        self.store
            .record_successful_login(account.id, now)
            .await
            .map_err(|e| {
                error!("Failed to record login for {}: {}", account.username, e);
                AuthError::Store(e)
            })?;

        let token = self.jwt.generate_token(account.id)?;

        let mut user = AuthUser::from(&account);
        user.last_login = Some(now);

        info!("User {} logged in successfully", user.username);

        Ok(LoginOutcome { token, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::password::hash_password;
    use crate::store::tests::{insert, test_db};
    use chrono::{Duration, Utc};
    use nucleus_db::{AccountStatus, Database, LockoutState, Role};
    use tempfile::TempDir;

    const PASSWORD: &str = "correct horse battery";

    struct Fixture {
        db: Database,
        clock: Arc<ManualClock>,
        jwt: Arc<JwtManager>,
        service: LoginService,
        account_id: i64,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let (db, dir) = test_db().await;
        let hash = hash_password(PASSWORD).unwrap();
        let account = insert(&db, "teller", &hash, Role::Moderator).await;

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let jwt = Arc::new(JwtManager::new("login-secret", 24).with_clock(clock.clone()));
        let service = LoginService::new(
            Arc::new(db.clone()),
            jwt.clone(),
            LockoutPolicy::default(),
            clock.clone(),
        );

        Fixture {
            db,
            clock,
            jwt,
            service,
            account_id: account.id,
            _dir: dir,
        }
    }

    async fn lockout(f: &Fixture) -> LockoutState {
        f.db
            .find_account_by_id(f.account_id)
            .await
            .unwrap()
            .unwrap()
            .lockout
    }

    #[tokio::test]
    async fn test_login_success() {
        let f = fixture().await;
        let outcome = f.service.login("teller", PASSWORD).await.unwrap();

        assert_eq!(outcome.user.id, f.account_id);
        assert_eq!(outcome.user.role, Role::Moderator);
        assert_eq!(outcome.user.last_login, Some(f.clock.now()));

        let claims = f.jwt.validate_token(&outcome.token.token).unwrap();
        assert_eq!(claims.subject_id().unwrap(), f.account_id);
    }

    #[tokio::test]
    async fn test_login_by_email() {
        let f = fixture().await;
        assert!(f.service.login("Teller@Nucleus.test", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_identifier() {
        let f = fixture().await;
        let result = f.service.login("nobody", PASSWORD).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_failures_increment_counter() {
        let f = fixture().await;
        for expected in 1..=3 {
            let result = f.service.login("teller", "wrong").await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
            let state = lockout(&f).await;
            assert_eq!(state.failed_login_count, expected);
            assert!(state.locked_until.is_none());
        }
    }

    #[tokio::test]
    async fn test_lockout_scenario() {
        let f = fixture().await;
        f.db.update_lockout_state(
            f.account_id,
            LockoutState {
                failed_login_count: 4,
                locked_until: None,
            },
        )
        .await
        .unwrap();

        // Fifth failure locks the account for two hours
        let result = f.service.login("teller", "wrong").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        let state = lockout(&f).await;
        assert_eq!(state.failed_login_count, 5);
        let locked_until = state.locked_until.unwrap();
        let expected = f.clock.now() + Duration::hours(2);
        assert!((locked_until - expected).num_milliseconds().abs() <= 1);

        // The correct password does not help while locked
        let result = f.service.login("teller", PASSWORD).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert_eq!(lockout(&f).await, state);

        f.clock.advance(Duration::hours(2) + Duration::seconds(1));
        let outcome = f.service.login("teller", PASSWORD).await.unwrap();
        assert_eq!(outcome.user.id, f.account_id);
        assert_eq!(lockout(&f).await, LockoutState::default());
    }

    #[tokio::test]
    async fn test_failure_after_lock_expiry_starts_fresh() {
        let f = fixture().await;
        f.db.update_lockout_state(
            f.account_id,
            LockoutState {
                failed_login_count: 5,
                locked_until: Some(f.clock.now() + Duration::hours(2)),
            },
        )
        .await
        .unwrap();

        f.clock.advance(Duration::hours(3));
        let result = f.service.login("teller", "wrong").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));

        let state = lockout(&f).await;
        assert_eq!(state.failed_login_count, 1);
        assert!(state.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let f = fixture().await;
        f.service.login("teller", "wrong").await.unwrap_err();
        f.service.login("teller", "wrong").await.unwrap_err();
        f.service.login("teller", PASSWORD).await.unwrap();
        assert_eq!(lockout(&f).await, LockoutState::default());
    }

    #[tokio::test]
    async fn test_disabled_account() {
        let f = fixture().await;
        f.db.update_account_status(
            f.account_id,
            &AccountStatus {
                is_banned: true,
                ban_reason: Some("vandalism".to_string()),
                ..AccountStatus::default()
            },
        )
        .await
        .unwrap();

        let result = f.service.login("teller", PASSWORD).await;
        assert!(matches!(result, Err(AuthError::AccountDisabled)));

        // A wrong password stays indistinguishable from any other failure
        let result = f.service.login("teller", "wrong").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unlock_clears_active_lock() {
        let f = fixture().await;
        for _ in 0..5 {
            f.service.login("teller", "wrong").await.unwrap_err();
        }
        assert!(lockout(&f).await.is_locked_at(f.clock.now()));

        assert!(f.service.unlock(f.account_id).await.unwrap());
        assert_eq!(lockout(&f).await, LockoutState::default());
        assert!(f.service.login("teller", PASSWORD).await.is_ok());

        assert!(!f.service.unlock(9999).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_generic_failure() {
        let f = fixture().await;
        insert(&f.db, "corrupt", "not-a-hash", Role::Basic).await;
        let result = f.service.login("corrupt", PASSWORD).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }
}
