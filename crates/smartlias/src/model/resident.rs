//! Resident records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{default_true, flag};

/// Sex as recorded by the barangay. Stored as `1`/`2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Code 1.
    Male,
    /// Code 2.
    Female,
}

impl Gender {
    /// Numeric code used in the database.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Male => 1,
            Self::Female => 2,
        }
    }

    /// Look up a gender by numeric code.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Male),
            2 => Some(Self::Female),
            _ => None,
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    /// Accepts `male`/`female` (any case) and the codes `1`/`2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "1" => Ok(Self::Male),
            "female" | "f" | "2" => Ok(Self::Female),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// Name suffix, stored as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Suffix {
    /// Jr. (1)
    Jr,
    /// Sr. (2)
    Sr,
    /// II (3)
    II,
    /// III (4)
    III,
    /// IV (5)
    IV,
    /// V (6)
    V,
}

impl Suffix {
    /// Display label, e.g. `Jr.`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Jr => "Jr.",
            Self::Sr => "Sr.",
            Self::II => "II",
            Self::III => "III",
            Self::IV => "IV",
            Self::V => "V",
        }
    }
}

impl TryFrom<u8> for Suffix {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Jr),
            2 => Ok(Self::Sr),
            3 => Ok(Self::II),
            4 => Ok(Self::III),
            5 => Ok(Self::IV),
            6 => Ok(Self::V),
            other => Err(format!("unknown suffix code: {other}")),
        }
    }
}

impl From<Suffix> for u8 {
    fn from(suffix: Suffix) -> Self {
        match suffix {
            Suffix::Jr => 1,
            Suffix::Sr => 2,
            Suffix::II => 3,
            Suffix::III => 4,
            Suffix::IV => 5,
            Suffix::V => 6,
        }
    }
}

/// Sectoral groups the barangay tracks for assistance and SMS targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialCategory {
    /// Person with disability.
    Pwd,
    /// Senior citizen (60+).
    SeniorCitizen,
    /// Solo parent.
    SoloParent,
    /// Indigent family.
    Indigent,
}

impl SpecialCategory {
    /// All categories, in display order.
    pub const ALL: [Self; 4] = [Self::Pwd, Self::SeniorCitizen, Self::SoloParent, Self::Indigent];

    /// Tag form, e.g. `SENIOR_CITIZEN`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pwd => "PWD",
            Self::SeniorCitizen => "SENIOR_CITIZEN",
            Self::SoloParent => "SOLO_PARENT",
            Self::Indigent => "INDIGENT",
        }
    }

    /// Plural label for announcements, e.g. `Senior Citizens`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pwd => "PWD",
            Self::SeniorCitizen => "Senior Citizens",
            Self::SoloParent => "Solo Parents",
            Self::Indigent => "Indigent Families",
        }
    }
}

impl fmt::Display for SpecialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown special category: {s}"))
    }
}

/// A citizen record maintained by barangay staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resident {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Linked login account, if any.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Family name.
    pub last_name: String,
    /// Given name.
    pub first_name: String,
    /// Middle name.
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Name suffix.
    #[serde(default)]
    pub suffix: Option<Suffix>,
    /// Date of birth.
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// Sex.
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Civil status, free text (single, married, ...).
    #[serde(default)]
    pub civil_status: Option<String>,
    /// Mobile number as entered.
    #[serde(default)]
    pub contact_number: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Street address.
    pub address: String,
    /// Purok (zone) number.
    #[serde(default)]
    pub purok: Option<u8>,
    /// Religion.
    #[serde(default)]
    pub religion: Option<String>,
    /// Occupation.
    #[serde(default)]
    pub occupation: Option<String>,
    /// Sectoral groups this resident belongs to.
    #[serde(default)]
    pub special_categories: Vec<SpecialCategory>,
    /// Soft-delete flag, persisted as `0`/`1`.
    #[serde(with = "flag", default = "default_true")]
    pub is_active: bool,
    /// When the record was created.
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// When the record was last edited.
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resident {
    /// Zero-padded identifier shown to staff, e.g. `000042`.
    #[must_use]
    pub fn display_id(&self) -> String {
        format_id(self.id)
    }

    /// `First M. Last Jr.` style full name.
    #[must_use]
    pub fn full_name(&self) -> String {
        let mut name = self.first_name.clone();
        if let Some(initial) = self
            .middle_name
            .as_deref()
            .and_then(|m| m.chars().next())
        {
            name.push(' ');
            name.push(initial);
            name.push('.');
        }
        name.push(' ');
        name.push_str(&self.last_name);
        if let Some(suffix) = self.suffix {
            name.push(' ');
            name.push_str(suffix.label());
        }
        name
    }

    /// Whether the resident belongs to `category`.
    #[must_use]
    pub fn has_category(&self, category: SpecialCategory) -> bool {
        self.special_categories.contains(&category)
    }
}

/// Format a record id with leading zeros to six digits.
#[must_use]
pub fn format_id(id: i64) -> String {
    format!("{id:06}")
}
