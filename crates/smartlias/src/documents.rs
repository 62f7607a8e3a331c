//! Barangay document requests.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{DocumentRequest, DocumentStatus, DocumentType};
use crate::storage::Store;

/// Minimum purpose length, after trimming.
pub const PURPOSE_MIN_LEN: usize = 5;

/// Maximum purpose length, after trimming.
pub const PURPOSE_MAX_LEN: usize = 200;

/// A new request as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    /// Requesting resident. Ignored for residents, who always request for
    /// themselves.
    #[serde(default, alias = "residentId")]
    pub resident_id: Option<i64>,
    /// Document wanted.
    #[serde(alias = "documentType", alias = "type")]
    pub document_type: DocumentType,
    /// What the document is for.
    #[serde(default)]
    pub purpose: String,
}

/// A status change requested by staff.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    /// Target status.
    pub status: DocumentStatus,
    /// Note for the resident; required when rejecting.
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Which requests to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DocumentFilter {
    /// Only this resident's requests.
    #[serde(default, alias = "residentId")]
    pub resident_id: Option<i64>,
    /// Only requests in this status.
    #[serde(default)]
    pub status: Option<DocumentStatus>,
}

impl DocumentFilter {
    fn matches(&self, request: &DocumentRequest) -> bool {
        self.resident_id.map_or(true, |id| request.resident_id == id)
            && self.status.map_or(true, |s| request.status == s)
    }
}

fn validate_purpose(purpose: &str) -> Result<String> {
    let purpose = purpose.trim();
    let len = purpose.chars().count();
    if len < PURPOSE_MIN_LEN {
        return Err(Error::validation(
            "purpose",
            format!("Purpose must be at least {PURPOSE_MIN_LEN} characters"),
        ));
    }
    if len > PURPOSE_MAX_LEN {
        return Err(Error::validation(
            "purpose",
            format!("Purpose must not exceed {PURPOSE_MAX_LEN} characters"),
        ));
    }
    Ok(purpose.to_string())
}

/// Document request service.
#[derive(Debug)]
pub struct DocumentService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl DocumentService {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// File a request for `resident_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad purpose or an unknown or
    /// inactive resident.
    pub fn create(
        &self,
        resident_id: i64,
        document_type: DocumentType,
        purpose: &str,
    ) -> Result<DocumentRequest> {
        let purpose = validate_purpose(purpose)?;
        let active = self
            .store
            .get_resident(resident_id)?
            .is_some_and(|r| r.is_active);
        if !active {
            return Err(Error::validation(
                "resident_id",
                "Resident not found or inactive",
            ));
        }

        let request = self.store.insert_document_request(DocumentRequest {
            id: 0,
            resident_id,
            document_type,
            purpose,
            status: DocumentStatus::Pending,
            remarks: None,
            created_at: self.clock.now(),
            updated_at: None,
        })?;
        info!(
            "Document request {} filed: {} for resident {}",
            request.id,
            request.document_type.as_str(),
            resident_id
        );
        Ok(request)
    }

    /// Requests matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list(&self, filter: &DocumentFilter) -> Result<Vec<DocumentRequest>> {
        let mut requests: Vec<DocumentRequest> = self
            .store
            .list_document_requests()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(requests)
    }

    /// Fetch one request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn get(&self, id: i64) -> Result<DocumentRequest> {
        self.store
            .get_document_request(id)?
            .ok_or_else(|| Error::not_found("Document request", id))
    }

    /// Move a request along its workflow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, [`Error::Conflict`] for
    /// a move the workflow does not allow, or a validation error when a
    /// rejection has no remarks.
    pub fn transition(&self, id: i64, change: &StatusChange) -> Result<DocumentRequest> {
        let mut request = self.get(id)?;
        let next = change.status;
        if !request.status.can_transition_to(next) {
            return Err(Error::conflict(format!(
                "Cannot change a {} request to {}",
                request.status.as_str(),
                next.as_str()
            )));
        }
        let remarks = change
            .remarks
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        if next == DocumentStatus::Rejected && remarks.is_none() {
            return Err(Error::validation(
                "remarks",
                "Remarks are required when rejecting a request",
            ));
        }

        let previous = request.status;
        request.status = next;
        if remarks.is_some() {
            request.remarks = remarks;
        }
        request.updated_at = Some(self.clock.now());
        self.store.update_document_request(&request)?;
        info!(
            "Document request {}: {} -> {}",
            request.id,
            previous.as_str(),
            next.as_str()
        );
        Ok(request)
    }
}
