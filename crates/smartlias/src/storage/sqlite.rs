//! `SQLite` backend.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    Announcement, AnnouncementKind, DocumentRequest, Gender, Resident, Role, SmsDelivery, Suffix,
    User,
};

use super::{migrations, Store};

const RESIDENT_COLUMNS: &str = "id, user_id, last_name, first_name, middle_name, suffix, \
     birth_date, gender, civil_status, contact_number, email, address, purok, religion, \
     occupation, special_categories, is_active, created_at, updated_at";

const USER_COLUMNS: &str = "id, username, pin_hash, role, first_name, last_name, \
     is_pin_changed, failed_attempts, last_attempt, locked_until, created_at, last_login_at";

const ANNOUNCEMENT_COLUMNS: &str = "id, title, content, type, is_urgent, target_groups, \
     sms_target_groups, status, published_at, created_by, created_at, updated_at";

const DELIVERY_COLUMNS: &str =
    "id, announcement_id, recipient, resident_id, status, error, attempted_at";

const DOCUMENT_COLUMNS: &str =
    "id, resident_id, document_type, purpose, status, remarks, created_at, updated_at";

/// Records kept in a single `SQLite` database.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection, shared by all request handlers.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets the CLI read while the server writes.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database, for tests and demos.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database lock poisoned"))
    }

    fn row_to_resident(row: &Row<'_>) -> rusqlite::Result<Resident> {
        let suffix: Option<u8> = row.get(5)?;
        let birth_date: Option<String> = row.get(6)?;
        let gender: Option<i64> = row.get(7)?;
        Ok(Resident {
            id: row.get(0)?,
            user_id: row.get(1)?,
            last_name: row.get(2)?,
            first_name: row.get(3)?,
            middle_name: row.get(4)?,
            suffix: suffix
                .map(|code| Suffix::try_from(code).map_err(|e| conversion(5, e)))
                .transpose()?,
            birth_date: birth_date.map(|s| parse_date(6, &s)).transpose()?,
            gender: gender
                .map(|code| {
                    Gender::from_code(code).ok_or_else(|| conversion(7, format!("bad gender {code}")))
                })
                .transpose()?,
            civil_status: row.get(8)?,
            contact_number: row.get(9)?,
            email: row.get(10)?,
            address: row.get(11)?,
            purok: row.get(12)?,
            religion: row.get(13)?,
            occupation: row.get(14)?,
            special_categories: parse_json(15, &row.get::<_, String>(15)?)?,
            is_active: row.get(16)?,
            created_at: parse_time(17, &row.get::<_, String>(17)?)?,
            updated_at: parse_opt_time(18, row.get(18)?)?,
        })
    }

    fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        let role: i64 = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            pin_hash: row.get(2)?,
            role: Role::from_id(role).ok_or_else(|| conversion(3, format!("bad role {role}")))?,
            first_name: row.get(4)?,
            last_name: row.get(5)?,
            is_pin_changed: row.get(6)?,
            failed_attempts: row.get(7)?,
            last_attempt: parse_opt_time(8, row.get(8)?)?,
            locked_until: parse_opt_time(9, row.get(9)?)?,
            created_at: parse_time(10, &row.get::<_, String>(10)?)?,
            last_login_at: parse_opt_time(11, row.get(11)?)?,
        })
    }

    fn row_to_announcement(row: &Row<'_>) -> rusqlite::Result<Announcement> {
        let kind: u8 = row.get(3)?;
        Ok(Announcement {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            kind: AnnouncementKind::try_from(kind).map_err(|e| conversion(3, e))?,
            is_urgent: row.get(4)?,
            target_groups: parse_json(5, &row.get::<_, String>(5)?)?,
            sms_target_groups: parse_json(6, &row.get::<_, String>(6)?)?,
            status: row
                .get::<_, String>(7)?
                .parse()
                .map_err(|e| conversion(7, e))?,
            published_at: parse_opt_time(8, row.get(8)?)?,
            created_by: row.get(9)?,
            created_at: parse_time(10, &row.get::<_, String>(10)?)?,
            updated_at: parse_opt_time(11, row.get(11)?)?,
        })
    }

    fn row_to_delivery(row: &Row<'_>) -> rusqlite::Result<SmsDelivery> {
        Ok(SmsDelivery {
            id: row.get(0)?,
            announcement_id: row.get(1)?,
            recipient: row.get(2)?,
            resident_id: row.get(3)?,
            status: row
                .get::<_, String>(4)?
                .parse()
                .map_err(|e| conversion(4, e))?,
            error: row.get(5)?,
            attempted_at: parse_time(6, &row.get::<_, String>(6)?)?,
        })
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<DocumentRequest> {
        Ok(DocumentRequest {
            id: row.get(0)?,
            resident_id: row.get(1)?,
            document_type: row
                .get::<_, String>(2)?
                .parse()
                .map_err(|e| conversion(2, e))?,
            purpose: row.get(3)?,
            status: row
                .get::<_, String>(4)?
                .parse()
                .map_err(|e| conversion(4, e))?,
            remarks: row.get(5)?,
            created_at: parse_time(6, &row.get::<_, String>(6)?)?,
            updated_at: parse_opt_time(7, row.get(7)?)?,
        })
    }
}

fn conversion(index: usize, message: impl Into<String>) -> rusqlite::Error {
    let message: String = message.into();
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

fn parse_time(index: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn parse_opt_time(index: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_time(index, &s)).transpose()
}

fn parse_date(index: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn parse_json<T: DeserializeOwned>(index: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn time(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn opt_time(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(time)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl Store for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn insert_resident(&self, mut resident: Resident) -> Result<Resident> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO residents (user_id, last_name, first_name, middle_name, suffix,
                birth_date, gender, civil_status, contact_number, email, address, purok,
                religion, occupation, special_categories, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ",
            params![
                resident.user_id,
                resident.last_name,
                resident.first_name,
                resident.middle_name,
                resident.suffix.map(u8::from),
                resident.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
                resident.gender.map(Gender::code),
                resident.civil_status,
                resident.contact_number,
                resident.email,
                resident.address,
                resident.purok,
                resident.religion,
                resident.occupation,
                serde_json::to_string(&resident.special_categories)?,
                resident.is_active,
                time(resident.created_at),
                opt_time(resident.updated_at),
            ],
        )?;
        resident.id = conn.last_insert_rowid();
        debug!("Inserted resident {}", resident.id);
        Ok(resident)
    }

    fn get_resident(&self, id: i64) -> Result<Option<Resident>> {
        let conn = self.conn()?;
        let resident = conn
            .query_row(
                &format!("SELECT {RESIDENT_COLUMNS} FROM residents WHERE id = ?1"),
                [id],
                Self::row_to_resident,
            )
            .optional()?;
        Ok(resident)
    }

    fn find_resident_by_user(&self, user_id: i64) -> Result<Option<Resident>> {
        let conn = self.conn()?;
        let resident = conn
            .query_row(
                &format!("SELECT {RESIDENT_COLUMNS} FROM residents WHERE user_id = ?1 LIMIT 1"),
                [user_id],
                Self::row_to_resident,
            )
            .optional()?;
        Ok(resident)
    }

    fn update_resident(&self, resident: &Resident) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            r"
            UPDATE residents SET user_id = ?2, last_name = ?3, first_name = ?4,
                middle_name = ?5, suffix = ?6, birth_date = ?7, gender = ?8,
                civil_status = ?9, contact_number = ?10, email = ?11, address = ?12,
                purok = ?13, religion = ?14, occupation = ?15, special_categories = ?16,
                is_active = ?17, created_at = ?18, updated_at = ?19
            WHERE id = ?1
            ",
            params![
                resident.id,
                resident.user_id,
                resident.last_name,
                resident.first_name,
                resident.middle_name,
                resident.suffix.map(u8::from),
                resident.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
                resident.gender.map(Gender::code),
                resident.civil_status,
                resident.contact_number,
                resident.email,
                resident.address,
                resident.purok,
                resident.religion,
                resident.occupation,
                serde_json::to_string(&resident.special_categories)?,
                resident.is_active,
                time(resident.created_at),
                opt_time(resident.updated_at),
            ],
        )?;
        Ok(affected > 0)
    }

    fn list_residents(&self) -> Result<Vec<Resident>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESIDENT_COLUMNS} FROM residents ORDER BY id"
        ))?;
        let residents = stmt
            .query_map([], Self::row_to_resident)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(residents)
    }

    fn insert_user(&self, mut user: User) -> Result<User> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO users (username, pin_hash, role, first_name, last_name, is_pin_changed,
                failed_attempts, last_attempt, locked_until, created_at, last_login_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                user.username,
                user.pin_hash,
                user.role.id(),
                user.first_name,
                user.last_name,
                user.is_pin_changed,
                user.failed_attempts,
                opt_time(user.last_attempt),
                opt_time(user.locked_until),
                time(user.created_at),
                opt_time(user.last_login_at),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::conflict(format!("Username {} is already taken", user.username))
            } else {
                e.into()
            }
        })?;
        user.id = conn.last_insert_rowid();
        debug!("Inserted user {} ({})", user.id, user.username);
        Ok(user)
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        // The column is COLLATE NOCASE, so `=` ignores ASCII case.
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn update_user(&self, user: &User) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            r"
            UPDATE users SET username = ?2, pin_hash = ?3, role = ?4, first_name = ?5,
                last_name = ?6, is_pin_changed = ?7, failed_attempts = ?8, last_attempt = ?9,
                locked_until = ?10, created_at = ?11, last_login_at = ?12
            WHERE id = ?1
            ",
            params![
                user.id,
                user.username,
                user.pin_hash,
                user.role.id(),
                user.first_name,
                user.last_name,
                user.is_pin_changed,
                user.failed_attempts,
                opt_time(user.last_attempt),
                opt_time(user.locked_until),
                time(user.created_at),
                opt_time(user.last_login_at),
            ],
        )?;
        Ok(affected > 0)
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn list_usernames(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT username FROM users ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn insert_announcement(&self, mut announcement: Announcement) -> Result<Announcement> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO announcements (title, content, type, is_urgent, target_groups,
                sms_target_groups, status, published_at, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                announcement.title,
                announcement.content,
                u8::from(announcement.kind),
                announcement.is_urgent,
                serde_json::to_string(&announcement.target_groups)?,
                serde_json::to_string(&announcement.sms_target_groups)?,
                announcement.status.as_str(),
                opt_time(announcement.published_at),
                announcement.created_by,
                time(announcement.created_at),
                opt_time(announcement.updated_at),
            ],
        )?;
        announcement.id = conn.last_insert_rowid();
        debug!("Inserted announcement {}", announcement.id);
        Ok(announcement)
    }

    fn get_announcement(&self, id: i64) -> Result<Option<Announcement>> {
        let conn = self.conn()?;
        let announcement = conn
            .query_row(
                &format!("SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements WHERE id = ?1"),
                [id],
                Self::row_to_announcement,
            )
            .optional()?;
        Ok(announcement)
    }

    fn update_announcement(&self, announcement: &Announcement) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            r"
            UPDATE announcements SET title = ?2, content = ?3, type = ?4, is_urgent = ?5,
                target_groups = ?6, sms_target_groups = ?7, status = ?8, published_at = ?9,
                created_by = ?10, created_at = ?11, updated_at = ?12
            WHERE id = ?1
            ",
            params![
                announcement.id,
                announcement.title,
                announcement.content,
                u8::from(announcement.kind),
                announcement.is_urgent,
                serde_json::to_string(&announcement.target_groups)?,
                serde_json::to_string(&announcement.sms_target_groups)?,
                announcement.status.as_str(),
                opt_time(announcement.published_at),
                announcement.created_by,
                time(announcement.created_at),
                opt_time(announcement.updated_at),
            ],
        )?;
        Ok(affected > 0)
    }

    fn publish_announcement(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            r"
            UPDATE announcements SET status = 'published', published_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'draft'
            ",
            params![id, time(at)],
        )?;
        Ok(affected > 0)
    }

    fn delete_announcement(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sms_deliveries WHERE announcement_id = ?1", [id])?;
        let affected = tx.execute("DELETE FROM announcements WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(affected > 0)
    }

    fn list_announcements(&self) -> Result<Vec<Announcement>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements ORDER BY id"
        ))?;
        let announcements = stmt
            .query_map([], Self::row_to_announcement)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(announcements)
    }

    fn insert_deliveries(&self, deliveries: Vec<SmsDelivery>) -> Result<Vec<SmsDelivery>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut saved = Vec::with_capacity(deliveries.len());
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO sms_deliveries (announcement_id, recipient, resident_id, status,
                    error, attempted_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?;
            for mut delivery in deliveries {
                stmt.execute(params![
                    delivery.announcement_id,
                    delivery.recipient,
                    delivery.resident_id,
                    delivery.status.as_str(),
                    delivery.error,
                    time(delivery.attempted_at),
                ])?;
                delivery.id = tx.last_insert_rowid();
                saved.push(delivery);
            }
        }
        tx.commit()?;
        Ok(saved)
    }

    fn deliveries_for(&self, announcement_id: i64) -> Result<Vec<SmsDelivery>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM sms_deliveries WHERE announcement_id = ?1 ORDER BY id"
        ))?;
        let deliveries = stmt
            .query_map([announcement_id], Self::row_to_delivery)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(deliveries)
    }

    fn insert_document_request(&self, mut request: DocumentRequest) -> Result<DocumentRequest> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO document_requests (resident_id, document_type, purpose, status,
                remarks, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                request.resident_id,
                request.document_type.as_str(),
                request.purpose,
                request.status.as_str(),
                request.remarks,
                time(request.created_at),
                opt_time(request.updated_at),
            ],
        )?;
        request.id = conn.last_insert_rowid();
        Ok(request)
    }

    fn get_document_request(&self, id: i64) -> Result<Option<DocumentRequest>> {
        let conn = self.conn()?;
        let request = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM document_requests WHERE id = ?1"),
                [id],
                Self::row_to_document,
            )
            .optional()?;
        Ok(request)
    }

    fn update_document_request(&self, request: &DocumentRequest) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            r"
            UPDATE document_requests SET resident_id = ?2, document_type = ?3, purpose = ?4,
                status = ?5, remarks = ?6, created_at = ?7, updated_at = ?8
            WHERE id = ?1
            ",
            params![
                request.id,
                request.resident_id,
                request.document_type.as_str(),
                request.purpose,
                request.status.as_str(),
                request.remarks,
                time(request.created_at),
                opt_time(request.updated_at),
            ],
        )?;
        Ok(affected > 0)
    }

    fn list_document_requests(&self) -> Result<Vec<DocumentRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_requests ORDER BY id"
        ))?;
        let requests = stmt
            .query_map([], Self::row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requests)
    }
}
