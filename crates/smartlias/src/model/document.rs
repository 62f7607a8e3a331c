//! Document requests.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of certificate the barangay issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Barangay clearance.
    BarangayClearance,
    /// Certificate of residency.
    CertificateOfResidency,
    /// Certificate of indigency.
    CertificateOfIndigency,
    /// Business clearance.
    BusinessClearance,
}

impl DocumentType {
    /// Snake-case key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BarangayClearance => "barangay_clearance",
            Self::CertificateOfResidency => "certificate_of_residency",
            Self::CertificateOfIndigency => "certificate_of_indigency",
            Self::BusinessClearance => "business_clearance",
        }
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "barangay_clearance" => Ok(Self::BarangayClearance),
            "certificate_of_residency" => Ok(Self::CertificateOfResidency),
            "certificate_of_indigency" => Ok(Self::CertificateOfIndigency),
            "business_clearance" => Ok(Self::BusinessClearance),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// Processing state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Submitted, not yet looked at.
    #[default]
    Pending,
    /// Staff are preparing the document.
    Processing,
    /// Ready for pickup.
    Ready,
    /// Handed to the resident.
    Released,
    /// Declined by staff.
    Rejected,
}

impl DocumentStatus {
    /// Lowercase key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Released => "released",
            Self::Rejected => "rejected",
        }
    }

    /// Whether staff may move a request from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Ready)
                | (Self::Ready, Self::Released)
                | (Self::Pending | Self::Processing, Self::Rejected)
        )
    }

    /// No further transitions are possible.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Released | Self::Rejected)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "released" => Ok(Self::Released),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown document status: {other}")),
        }
    }
}

/// A resident's request for a barangay document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    /// Identifier assigned by the store.
    pub id: i64,
    /// Requesting resident.
    pub resident_id: i64,
    /// What is being requested.
    pub document_type: DocumentType,
    /// Why the resident needs it.
    pub purpose: String,
    /// Processing state.
    #[serde(default)]
    pub status: DocumentStatus,
    /// Staff notes; required on rejection.
    #[serde(default)]
    pub remarks: Option<String>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
