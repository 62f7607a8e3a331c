//! Failed-login counting and temporary account locks.
//!
//! An account is locked once `max_attempts` failures land inside
//! `attempt_window`; the lock lasts `lockout_duration`. A failure that
//! arrives after the window has passed starts a fresh count.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::User;

/// Thresholds for locking an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures that trigger a lock.
    pub max_attempts: u32,
    /// How long a lock lasts.
    pub lockout_duration: Duration,
    /// Failures older than this no longer count.
    pub attempt_window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::minutes(15),
            attempt_window: Duration::minutes(15),
        }
    }
}

/// The lockout-relevant slice of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttemptState {
    /// Failures in the current window.
    pub failed_attempts: u32,
    /// Most recent failure.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Lock expiry.
    pub locked_until: Option<DateTime<Utc>>,
}

impl AttemptState {
    /// Read the counters off a user record.
    #[must_use]
    pub fn of(user: &User) -> Self {
        Self {
            failed_attempts: user.failed_attempts,
            last_attempt: user.last_attempt,
            locked_until: user.locked_until,
        }
    }

    /// Write the counters back onto a user record.
    pub fn apply_to(self, user: &mut User) {
        user.failed_attempts = self.failed_attempts;
        user.last_attempt = self.last_attempt;
        user.locked_until = self.locked_until;
    }
}

/// Whether a lock is in force at `now`.
#[must_use]
pub fn is_account_locked(state: &AttemptState, now: DateTime<Utc>) -> bool {
    state.locked_until.is_some_and(|until| now < until)
}

impl LockoutPolicy {
    /// Whether the failure count has reached the threshold.
    #[must_use]
    pub fn should_lock_account(&self, state: &AttemptState) -> bool {
        state.failed_attempts >= self.max_attempts
    }

    /// When a lock starting at `now` ends.
    #[must_use]
    pub fn lockout_end_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.lockout_duration
    }

    /// Whether the last failure is old enough that counting starts over.
    ///
    /// Exactly `attempt_window` after the last failure still counts.
    #[must_use]
    pub fn should_reset_attempts(&self, state: &AttemptState, now: DateTime<Utc>) -> bool {
        state
            .last_attempt
            .is_some_and(|last| now - last > self.attempt_window)
    }

    /// Record a failed login at `now`.
    ///
    /// Returns `true` when this failure locked the account. A lock that has
    /// already run out is cleared along with its count.
    pub fn record_failure(&self, state: &mut AttemptState, now: DateTime<Utc>) -> bool {
        let lock_expired = state.locked_until.is_some_and(|until| now >= until);
        if lock_expired || self.should_reset_attempts(state, now) {
            state.failed_attempts = 0;
            state.locked_until = None;
        }
        state.failed_attempts = state.failed_attempts.saturating_add(1);
        state.last_attempt = Some(now);
        if self.should_lock_account(state) {
            state.locked_until = Some(self.lockout_end_time(now));
            true
        } else {
            false
        }
    }

    /// Clear all counters after a successful login.
    pub fn record_success(&self, state: &mut AttemptState) {
        *state = AttemptState::default();
    }

    /// Failures left before the account locks.
    #[must_use]
    pub fn remaining_attempts(&self, state: &AttemptState) -> u32 {
        self.max_attempts.saturating_sub(state.failed_attempts)
    }
}
