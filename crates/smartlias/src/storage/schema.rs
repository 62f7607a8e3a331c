//! `SQLite` schema definitions for smartlias.
//!
//! Timestamps are RFC 3339 text in UTC, dates are `YYYY-MM-DD`, and list
//! columns (special categories, target groups) hold JSON arrays.

/// Login accounts. Usernames are unique regardless of case.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
    pin_hash TEXT NOT NULL,
    role INTEGER NOT NULL,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    is_pin_changed INTEGER NOT NULL DEFAULT 0,
    failed_attempts INTEGER NOT NULL DEFAULT 0,
    last_attempt TEXT,
    locked_until TEXT,
    created_at TEXT NOT NULL,
    last_login_at TEXT
)
";

/// Resident records.
pub const CREATE_RESIDENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS residents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER REFERENCES users(id),
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    suffix INTEGER,
    birth_date TEXT,
    gender INTEGER,
    civil_status TEXT,
    contact_number TEXT,
    email TEXT,
    address TEXT NOT NULL,
    purok INTEGER,
    religion TEXT,
    occupation TEXT,
    special_categories TEXT NOT NULL DEFAULT '[]',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT
)
";

/// Residents are listed by name.
pub const CREATE_RESIDENT_NAME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_residents_name ON residents(last_name, first_name)
";

/// Account lookups from the resident side.
pub const CREATE_RESIDENT_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_residents_user ON residents(user_id)
";

/// Announcements.
pub const CREATE_ANNOUNCEMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS announcements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    type INTEGER NOT NULL DEFAULT 1,
    is_urgent INTEGER NOT NULL DEFAULT 0,
    target_groups TEXT NOT NULL DEFAULT '[]',
    sms_target_groups TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'draft',
    published_at TEXT,
    created_by INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT
)
";

/// One row per SMS send. Removed with their announcement.
pub const CREATE_SMS_DELIVERIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sms_deliveries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    announcement_id INTEGER NOT NULL REFERENCES announcements(id) ON DELETE CASCADE,
    recipient TEXT NOT NULL,
    resident_id INTEGER,
    status TEXT NOT NULL,
    error TEXT,
    attempted_at TEXT NOT NULL
)
";

/// Deliveries are always read per announcement.
pub const CREATE_DELIVERY_ANNOUNCEMENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sms_deliveries_announcement ON sms_deliveries(announcement_id)
";

/// Document requests.
pub const CREATE_DOCUMENT_REQUESTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS document_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    resident_id INTEGER NOT NULL REFERENCES residents(id),
    document_type TEXT NOT NULL,
    purpose TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    remarks TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_RESIDENTS_TABLE,
    CREATE_RESIDENT_NAME_INDEX,
    CREATE_RESIDENT_USER_INDEX,
    CREATE_ANNOUNCEMENTS_TABLE,
    CREATE_SMS_DELIVERIES_TABLE,
    CREATE_DELIVERY_ANNOUNCEMENT_INDEX,
    CREATE_DOCUMENT_REQUESTS_TABLE,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_usernames_are_case_insensitive_unique() {
        assert!(CREATE_USERS_TABLE.contains("username TEXT NOT NULL UNIQUE COLLATE NOCASE"));
    }

    #[test]
    fn test_deliveries_cascade() {
        assert!(CREATE_SMS_DELIVERIES_TABLE.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn test_tables_precede_their_indexes() {
        let position = |needle: &str| SCHEMA_STATEMENTS.iter().position(|s| s.contains(needle));
        assert!(position("TABLE IF NOT EXISTS residents") < position("idx_residents_name"));
        assert!(position("TABLE IF NOT EXISTS sms_deliveries") < position("idx_sms_deliveries"));
    }
}
