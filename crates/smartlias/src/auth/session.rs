//! In-memory bearer sessions.
//!
//! Sessions do not survive a restart; users simply log in again.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::Role;

/// An issued login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// Account the session belongs to.
    pub user_id: i64,
    /// Role at login time.
    pub role: Role,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Token → session map with a fixed TTL.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create an empty store issuing sessions that last `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .lock()
            .map_err(|_| Error::internal("session store lock poisoned"))
    }

    /// Issue a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn create(&self, user_id: i64, role: Role, now: DateTime<Utc>) -> Result<Session> {
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user_id,
            role,
            created_at: now,
            expires_at: now + self.ttl,
        };
        let mut sessions = self.lock()?;
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    /// Look up a live session. Expired sessions are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn get(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let mut sessions = self.lock()?;
        match sessions.get(token) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(token);
                Ok(None)
            }
            other => Ok(other.cloned()),
        }
    }

    /// Revoke one session. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn revoke(&self, token: &str) -> Result<bool> {
        Ok(self.lock()?.remove(token).is_some())
    }

    /// Revoke every session of `user_id` except `keep`.
    ///
    /// Returns how many were revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn revoke_user(&self, user_id: i64, keep: Option<&str>) -> Result<usize> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|token, s| s.user_id != user_id || Some(token.as_str()) == keep);
        Ok(before - sessions.len())
    }

    /// Number of sessions held, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether no sessions are held.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
