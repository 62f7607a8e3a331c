//! Error types for smartlias.
//!
//! This module defines all error types used throughout the smartlias crate,
//! providing detailed context for debugging and user-facing messages that
//! are safe to return over the API.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The main error type for smartlias operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A JSON data file exists but could not be understood.
    #[error("corrupt data file {path}: {message}")]
    DataFile {
        /// Path to the offending file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Input Errors ===
    /// User input failed validation. The message is shown to the user as-is.
    #[error("{message}")]
    Validation {
        /// The input field that failed.
        field: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    // === Authentication Errors ===
    /// No credentials were presented.
    #[error("Access denied. Please log in.")]
    Unauthorized,

    /// The presented session token is unknown or expired.
    #[error("Your session has expired. Please log in again.")]
    SessionExpired,

    /// The caller is authenticated but lacks the required role.
    #[error("You do not have permission to perform this action.")]
    Forbidden,

    /// Username or PIN did not match.
    #[error("Invalid username or PIN")]
    InvalidCredentials,

    /// The username is not registered.
    #[error("Username is not registered. Please visit Barangay Office.")]
    UsernameNotFound,

    /// Too many failed attempts; the account is temporarily locked.
    #[error(
        "Account locked due to too many failed attempts. Try again after {}.",
        crate::clock::format_manila(*until)
    )]
    AccountLocked {
        /// When the lock lifts.
        until: DateTime<Utc>,
    },

    // === Domain Errors ===
    /// A record does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// The request conflicts with the current state of a record.
    #[error("{0}")]
    Conflict(String),

    // === SMS Errors ===
    /// The SMS provider rejected or failed a send.
    #[error("SMS gateway error: {0}")]
    SmsGateway(String),

    /// An outbound HTTP request failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for smartlias operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error for the given field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an SMS gateway error.
    #[must_use]
    pub fn sms_gateway(message: impl Into<String>) -> Self {
        Self::SmsGateway(message.into())
    }

    /// Check if this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error means a record was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is an authentication or authorization failure.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::SessionExpired
                | Self::Forbidden
                | Self::InvalidCredentials
                | Self::UsernameNotFound
                | Self::AccountLocked { .. }
        )
    }

    /// Whether the message is safe to show to API callers verbatim.
    ///
    /// Storage, I/O and internal errors carry paths and driver detail that
    /// only belong in the logs.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        self.is_validation()
            || self.is_not_found()
            || self.is_auth_error()
            || matches!(self, Self::Conflict(_))
    }
}
