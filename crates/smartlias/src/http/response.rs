//! The `{success, data, message, error}` response envelope.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::Error;

/// Message returned for every unexpected failure. Details stay in the log.
pub const SERVER_ERROR_MESSAGE: &str = "Server error occurred. Please try again.";

/// Response body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Payload, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable note, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Human-readable reason, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 200 with `data`.
#[must_use]
pub fn ok<T: Serialize>(data: T) -> Response {
    with_status(StatusCode::OK, Some(data), None)
}

/// 201 with `data` and a message.
#[must_use]
pub fn created<T: Serialize>(data: T, message: &str) -> Response {
    with_status(StatusCode::CREATED, Some(data), Some(message))
}

/// 200 with `data` and a message.
#[must_use]
pub fn ok_with_message<T: Serialize>(data: T, message: &str) -> Response {
    with_status(StatusCode::OK, Some(data), Some(message))
}

/// 200 with only a message.
#[must_use]
pub fn message(message: &str) -> Response {
    with_status::<()>(StatusCode::OK, None, Some(message))
}

fn with_status<T: Serialize>(
    status: StatusCode,
    data: Option<T>,
    message: Option<&str>,
) -> Response {
    let body = Envelope {
        success: true,
        data,
        message: message.map(str::to_string),
        error: None,
    };
    (status, Json(body)).into_response()
}

/// A failure envelope.
#[must_use]
pub fn failure(status: StatusCode, reason: impl Into<String>) -> Response {
    let body: Envelope<()> = Envelope {
        success: false,
        data: None,
        message: None,
        error: Some(reason.into()),
    };
    (status, Json(body)).into_response()
}

/// 429 with a `retry-after` header in whole seconds.
#[must_use]
pub fn rate_limited(reason: &str, retry_after: Duration) -> Response {
    let mut response = failure(StatusCode::TOO_MANY_REQUESTS, reason);
    let secs = retry_after.as_secs().max(1);
    if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

/// HTTP status for an error.
#[must_use]
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation { .. } => StatusCode::BAD_REQUEST,
        Error::Unauthorized | Error::SessionExpired | Error::InvalidCredentials => {
            StatusCode::UNAUTHORIZED
        }
        Error::Forbidden => StatusCode::FORBIDDEN,
        Error::NotFound { .. } | Error::UsernameNotFound => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::AccountLocked { .. } => StatusCode::LOCKED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {self}");
            return failure(status, SERVER_ERROR_MESSAGE);
        }
        failure(status, self.to_string())
    }
}
