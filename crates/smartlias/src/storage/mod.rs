//! Storage layer for smartlias.
//!
//! A [`Store`] persists records and nothing more. Filtering, sorting,
//! pagination and every domain rule live in the services, so both backends
//! behave identically:
//!
//! - [`SqliteStore`]: a single `SQLite` database file
//! - [`JsonStore`]: one JSON file per collection, for demos and development

mod json;
pub mod migrations;
pub mod schema;
mod sqlite;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::model::{Announcement, DocumentRequest, Resident, SmsDelivery, User};

pub use json::JsonStore;
pub use sqlite::SqliteStore;

/// Record persistence shared by all services.
///
/// Insert methods ignore the `id` they are given and return the record with
/// the identifier the store assigned. Update methods return `false` when no
/// record with that id exists.
pub trait Store: Send + Sync + fmt::Debug {
    /// Short backend name for logs and diagnostics.
    fn backend_name(&self) -> &'static str;

    // === Residents ===

    /// Insert a resident.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn insert_resident(&self, resident: Resident) -> Result<Resident>;

    /// Fetch a resident, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_resident(&self, id: i64) -> Result<Option<Resident>>;

    /// Fetch the resident linked to an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_resident_by_user(&self, user_id: i64) -> Result<Option<Resident>>;

    /// Replace a resident record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn update_resident(&self, resident: &Resident) -> Result<bool>;

    /// Every resident, including inactive ones, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn list_residents(&self) -> Result<Vec<Resident>>;

    // === Users ===

    /// Insert an account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`](crate::Error::Conflict) if the username is
    /// taken (ignoring case), or an error if the backend fails.
    fn insert_user(&self, user: User) -> Result<User>;

    /// Fetch an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_user(&self, id: i64) -> Result<Option<User>>;

    /// Fetch an account by username, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Replace an account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn update_user(&self, user: &User) -> Result<bool>;

    /// Remove an account that no resident links to.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete_user(&self, id: i64) -> Result<bool>;

    /// All usernames, for generating new ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn list_usernames(&self) -> Result<Vec<String>>;

    // === Announcements ===

    /// Insert an announcement.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn insert_announcement(&self, announcement: Announcement) -> Result<Announcement>;

    /// Fetch an announcement.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_announcement(&self, id: i64) -> Result<Option<Announcement>>;

    /// Replace an announcement record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn update_announcement(&self, announcement: &Announcement) -> Result<bool>;

    /// Move a draft to published in one step, stamping `published_at` and
    /// `updated_at`. Returns `false` when the id is unknown or the
    /// announcement is not a draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn publish_announcement(&self, id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// Remove an announcement and its deliveries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete_announcement(&self, id: i64) -> Result<bool>;

    /// Every announcement, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn list_announcements(&self) -> Result<Vec<Announcement>>;

    /// Record SMS sends.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn insert_deliveries(&self, deliveries: Vec<SmsDelivery>) -> Result<Vec<SmsDelivery>>;

    /// Deliveries recorded for an announcement, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn deliveries_for(&self, announcement_id: i64) -> Result<Vec<SmsDelivery>>;

    // === Document requests ===

    /// Insert a document request.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn insert_document_request(&self, request: DocumentRequest) -> Result<DocumentRequest>;

    /// Fetch a document request.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get_document_request(&self, id: i64) -> Result<Option<DocumentRequest>>;

    /// Replace a document request.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn update_document_request(&self, request: &DocumentRequest) -> Result<bool>;

    /// Every document request, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn list_document_requests(&self) -> Result<Vec<DocumentRequest>>;
}

/// Open the backend selected in `config`.
///
/// # Errors
///
/// Returns an error if the database or data directory cannot be opened.
pub fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.storage.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(config.database_path())?),
        StorageBackend::Json => Arc::new(JsonStore::open(config.data_dir())?),
    };
    info!("Using {} storage backend", store.backend_name());
    Ok(store)
}
