//! Login credentials.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flag;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular resident (id 1).
    Resident,
    /// Barangay staff (id 2).
    Admin,
}

impl Role {
    /// Numeric id stored in the database.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::Resident => 1,
            Self::Admin => 2,
        }
    }

    /// Look up a role by numeric id.
    #[must_use]
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Resident),
            2 => Some(Self::Admin),
            _ => None,
        }
    }

    /// Display name, e.g. `Admin`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Resident => "Resident",
            Self::Admin => "Admin",
        }
    }

    /// Lowercase key, e.g. `admin`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::Admin => "admin",
        }
    }

    /// Landing page after login.
    #[must_use]
    pub fn home_path(self) -> &'static str {
        match self {
            Self::Resident => "/resident",
            Self::Admin => "/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resident" | "1" => Ok(Self::Resident),
            "admin" | "2" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A login account. Residents link to one through `Resident::user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Unique, compared case-insensitively.
    pub username: String,
    /// `salt$hash`; never the PIN itself.
    pub pin_hash: String,
    /// Account role.
    pub role: Role,
    /// Given name, copied from the resident record or set for staff.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Whether the initial PIN has been replaced.
    #[serde(with = "flag", default)]
    pub is_pin_changed: bool,
    /// Consecutive failed logins in the current window.
    #[serde(default)]
    pub failed_attempts: u32,
    /// Time of the most recent failed login.
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,
    /// Lock expiry, if locked.
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// Most recent successful login.
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// The public part of the account.
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
        }
    }
}

/// User fields safe to return over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// Account id.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Account role.
    pub role: Role,
}
