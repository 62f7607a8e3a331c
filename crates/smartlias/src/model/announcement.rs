//! Announcements and their SMS deliveries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SpecialCategory;

/// Announcement category, stored as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AnnouncementKind {
    /// General notice (1).
    #[default]
    General,
    /// Health programs (2).
    Health,
    /// Community activities (3).
    Activities,
    /// Assistance distributions (4).
    Assistance,
    /// Weather and safety advisories (5).
    Advisory,
}

impl AnnouncementKind {
    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Health => "Health",
            Self::Activities => "Activities",
            Self::Assistance => "Assistance",
            Self::Advisory => "Advisory",
        }
    }
}

impl TryFrom<u8> for AnnouncementKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::General),
            2 => Ok(Self::Health),
            3 => Ok(Self::Activities),
            4 => Ok(Self::Assistance),
            5 => Ok(Self::Advisory),
            other => Err(format!("unknown announcement type: {other}")),
        }
    }
}

impl From<AnnouncementKind> for u8 {
    fn from(kind: AnnouncementKind) -> Self {
        match kind {
            AnnouncementKind::General => 1,
            AnnouncementKind::Health => 2,
            AnnouncementKind::Activities => 3,
            AnnouncementKind::Assistance => 4,
            AnnouncementKind::Advisory => 5,
        }
    }
}

/// Publication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementStatus {
    /// Visible to admins only.
    #[default]
    Draft,
    /// Visible to everyone; SMS has been sent.
    Published,
}

impl AnnouncementStatus {
    /// Lowercase key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl FromStr for AnnouncementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown announcement status: {other}")),
        }
    }
}

/// Audience selector for SMS broadcasts.
///
/// Serialized as a tag string: `all`, `special_category:PWD`, `purok:3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetGroup {
    /// Every active resident.
    All,
    /// Residents in a sectoral group.
    SpecialCategory(SpecialCategory),
    /// Residents of one purok.
    Purok(u8),
}

impl TargetGroup {
    /// Human-readable label, e.g. `Purok 3`.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::All => "All Residents".to_string(),
            Self::SpecialCategory(category) => category.label().to_string(),
            Self::Purok(n) => format!("Purok {n}"),
        }
    }
}

impl fmt::Display for TargetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::SpecialCategory(category) => write!(f, "special_category:{category}"),
            Self::Purok(n) => write!(f, "purok:{n}"),
        }
    }
}

impl FromStr for TargetGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "all" {
            return Ok(Self::All);
        }
        if let Some(category) = s.strip_prefix("special_category:") {
            return category.parse().map(Self::SpecialCategory);
        }
        if let Some(n) = s.strip_prefix("purok:") {
            return n
                .parse::<u8>()
                .ok()
                .filter(|n| *n > 0)
                .map(Self::Purok)
                .ok_or_else(|| format!("invalid purok number: {n}"));
        }
        Err(format!("unknown target group: {s}"))
    }
}

impl TryFrom<String> for TargetGroup {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetGroup> for String {
    fn from(group: TargetGroup) -> Self {
        group.to_string()
    }
}

/// A barangay announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Headline.
    pub title: String,
    /// Body text, also used as the SMS message.
    pub content: String,
    /// Category.
    #[serde(rename = "type", default)]
    pub kind: AnnouncementKind,
    /// Shown with an urgent badge and prefixed in SMS.
    #[serde(default)]
    pub is_urgent: bool,
    /// Web audience; always `all`.
    #[serde(default = "all_residents")]
    pub target_groups: Vec<TargetGroup>,
    /// SMS audience. Empty means no SMS on publish.
    #[serde(default)]
    pub sms_target_groups: Vec<TargetGroup>,
    /// Publication state.
    #[serde(default)]
    pub status: AnnouncementStatus,
    /// When it was published.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Admin user who created it.
    #[serde(default)]
    pub created_by: Option<i64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn all_residents() -> Vec<TargetGroup> {
    vec![TargetGroup::All]
}

impl Announcement {
    /// Whether the announcement has been published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == AnnouncementStatus::Published
    }
}

/// Outcome of one SMS send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Accepted by the provider.
    Sent,
    /// Rejected or errored.
    Failed,
}

impl DeliveryStatus {
    /// Lowercase key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

/// One SMS sent (or attempted) for an announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsDelivery {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Announcement that triggered the send.
    pub announcement_id: i64,
    /// Normalised `+639XXXXXXXXX` number.
    pub recipient: String,
    /// Resident the number belongs to.
    #[serde(default)]
    pub resident_id: Option<i64>,
    /// Outcome.
    pub status: DeliveryStatus,
    /// Provider error, when failed.
    #[serde(default)]
    pub error: Option<String>,
    /// When the send was attempted.
    pub attempted_at: DateTime<Utc>,
}

/// Delivery counts for one announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SmsStatus {
    /// Recipients resolved at publish time.
    pub total_recipients: usize,
    /// Sends the provider accepted.
    pub successful_sends: usize,
    /// Sends that failed.
    pub failed_sends: usize,
}

impl SmsStatus {
    /// Tally a set of deliveries.
    #[must_use]
    pub fn from_deliveries(deliveries: &[SmsDelivery]) -> Self {
        let successful_sends = deliveries
            .iter()
            .filter(|d| d.status == DeliveryStatus::Sent)
            .count();
        Self {
            total_recipients: deliveries.len(),
            successful_sends,
            failed_sends: deliveries.len() - successful_sends,
        }
    }
}
