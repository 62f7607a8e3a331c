//! Core record types for smartlias.
//!
//! These are the plain records persisted by the storage backends and passed
//! between services. API-facing views live next to the services that build
//! them.

mod announcement;
mod document;
mod resident;
mod user;

pub use announcement::{
    Announcement, AnnouncementKind, AnnouncementStatus, DeliveryStatus, SmsDelivery, SmsStatus,
    TargetGroup,
};
pub use document::{DocumentRequest, DocumentStatus, DocumentType};
pub use resident::{Gender, Resident, SpecialCategory, Suffix};
pub use user::{Role, User, UserSummary};

/// Serde adapter storing a boolean as the integers `0`/`1`.
///
/// Accepts either integers or JSON booleans when reading, so hand-edited
/// data files with `true`/`false` still load.
pub(crate) mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Bool(bool),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => n != 0,
            Raw::Bool(b) => b,
        })
    }
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Flagged {
        #[serde(with = "super::flag", default = "super::default_true")]
        active: bool,
    }

    #[test]
    fn test_flag_serializes_as_integer() {
        let json = serde_json::to_string(&Flagged { active: false }).unwrap();
        assert_eq!(json, r#"{"active":0}"#);
    }

    #[test]
    fn test_flag_accepts_int_and_bool() {
        let a: Flagged = serde_json::from_str(r#"{"active":1}"#).unwrap();
        let b: Flagged = serde_json::from_str(r#"{"active":false}"#).unwrap();
        let c: Flagged = serde_json::from_str("{}").unwrap();
        assert!(a.active);
        assert!(!b.active);
        assert!(c.active);
    }
}
