//! Brute-force lockout state machine
//!
//! An account is Locked while `locked_until` lies in the future and
//! Unlocked otherwise. Only failed password checks move it towards Locked.
//! The transitions here are pure; the store applies the failure transition
//! atomically (see `CredentialStore::record_failed_login`).

use chrono::{DateTime, Duration, Utc};
use nucleus_db::LockoutState;

/// Failed attempts before the account is locked
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// How long a lock lasts
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lock_duration: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
        }
    }
}

impl LockoutPolicy {
    pub fn new(max_failed_attempts: u32, lock_duration: Duration) -> Self {
        Self {
            max_failed_attempts: max_failed_attempts.max(1),
            lock_duration,
        }
    }

    /// Attempts must be refused without checking the password
    pub fn is_locked(&self, state: &LockoutState, now: DateTime<Utc>) -> bool {
        state.is_locked_at(now)
    }

    /// State after a failed password check at `now`
    pub fn after_failure(&self, state: &LockoutState, now: DateTime<Utc>) -> LockoutState {
        if state.is_locked_at(now) {
            return *state;
        }

        // An expired lock starts a new window; this attempt is its first
        let failed_login_count = if state.lock_expired_at(now) {
            1
        } else {
            state.failed_login_count.saturating_add(1)
        };

        let locked_until =
            (failed_login_count >= self.max_failed_attempts).then(|| now + self.lock_duration);

        LockoutState {
            failed_login_count,
            locked_until,
        }
    }

    /// State after a successful password check
    pub fn after_success(&self) -> LockoutState {
        LockoutState::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(count: u32, locked_until: Option<DateTime<Utc>>) -> LockoutState {
        LockoutState {
            failed_login_count: count,
            locked_until,
        }
    }

    #[test]
    fn test_failures_below_threshold_increment() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        for count in 0..4 {
            let next = policy.after_failure(&state(count, None), now);
            assert_eq!(next.failed_login_count, count + 1);
            assert!(next.locked_until.is_none());
        }
    }

    #[test]
    fn test_fifth_failure_locks_for_two_hours() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let next = policy.after_failure(&state(4, None), now);
        assert_eq!(next.failed_login_count, 5);
        assert_eq!(next.locked_until, Some(now + Duration::hours(2)));
        assert!(policy.is_locked(&next, now + Duration::minutes(119)));
        assert!(!policy.is_locked(&next, now + Duration::hours(2)));
    }

    #[test]
    fn test_failure_while_locked_is_ignored() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let locked = state(5, Some(now + Duration::minutes(10)));
        assert_eq!(policy.after_failure(&locked, now), locked);
    }

    #[test]
    fn test_failure_after_expiry_restarts_window() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let expired = state(5, Some(now - Duration::seconds(1)));
        let next = policy.after_failure(&expired, now);
        assert_eq!(next, state(1, None));
    }

    #[test]
    fn test_threshold_of_one_relocks_after_expiry() {
        let policy = LockoutPolicy::new(1, Duration::minutes(5));
        let now = Utc::now();
        let expired = state(1, Some(now - Duration::seconds(1)));
        let next = policy.after_failure(&expired, now);
        assert_eq!(next, state(1, Some(now + Duration::minutes(5))));
    }

    #[test]
    fn test_success_clears_state() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.after_success(), LockoutState::default());
    }
}
