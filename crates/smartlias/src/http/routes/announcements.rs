//! `/api/announcements/*`.

use axum::extract::{Path, State};
use axum::response::Response;

use crate::announcements::AnnouncementInput;
use crate::error::Result;
use crate::http::extract::{AdminUser, ApiJson, CurrentUser};
use crate::http::response::{created, message, ok, ok_with_message};
use crate::http::AppState;
use crate::residents::parse_id;

pub(crate) async fn list(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<Response> {
    Ok(ok(state.announcements.list(&ctx)?))
}

pub(crate) async fn get(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id("Announcement", &id)?;
    Ok(ok(state.announcements.get(&ctx, id)?))
}

pub(crate) async fn create(
    State(state): State<AppState>,
    AdminUser(ctx): AdminUser,
    ApiJson(body): ApiJson<AnnouncementInput>,
) -> Result<Response> {
    let announcement = state.announcements.create(&ctx, &body)?;
    Ok(created(announcement, "Announcement created successfully"))
}

pub(crate) async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AnnouncementInput>,
) -> Result<Response> {
    let outcome = state
        .announcements
        .update(parse_id("Announcement", &id)?, &body)?;
    let note = if outcome.changed {
        "Announcement updated successfully"
    } else {
        "No changes detected"
    };
    Ok(ok_with_message(outcome.announcement, note))
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Response> {
    state.announcements.delete(parse_id("Announcement", &id)?)?;
    Ok(message("Announcement deleted successfully"))
}

pub(crate) async fn publish(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let outcome = state
        .announcements
        .publish(parse_id("Announcement", &id)?)
        .await?;
    Ok(ok_with_message(outcome, "Announcement published successfully"))
}

pub(crate) async fn sms_status(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let status = state
        .announcements
        .sms_status(parse_id("Announcement", &id)?)?;
    Ok(ok(status))
}
