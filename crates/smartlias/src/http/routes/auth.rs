//! `/api/auth/*` and account administration.

use axum::extract::{Path, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::extract::{AdminUser, ApiJson, CurrentUser};
use crate::http::response::{message, ok, ok_with_message};
use crate::http::AppState;
use crate::model::UserSummary;
use crate::residents::parse_id;

#[derive(Debug, Deserialize)]
pub(crate) struct UsernameRequest {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default, alias = "mpin", alias = "password")]
    pin: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChangePinRequest {
    #[serde(default, alias = "currentPin", alias = "currentPassword")]
    current_pin: String,
    #[serde(default, alias = "newPin", alias = "newPassword")]
    new_pin: String,
    #[serde(default, alias = "confirmPin", alias = "confirmPassword")]
    confirm_pin: String,
}

#[derive(Debug, Serialize)]
struct SessionInfo {
    user: UserSummary,
    expires_at: DateTime<Utc>,
    pin_change_required: bool,
}

pub(crate) async fn check_username(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UsernameRequest>,
) -> Result<Response> {
    let user = state.auth.check_username(&body.username)?;
    Ok(ok(user))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Response> {
    let response = state.auth.login(&body.username, &body.pin)?;
    Ok(ok_with_message(response, "Login successful"))
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<Response> {
    state.auth.logout(&ctx.session.token)?;
    Ok(message("Logged out successfully"))
}

pub(crate) async fn session(CurrentUser(ctx): CurrentUser) -> Response {
    ok(SessionInfo {
        pin_change_required: !ctx.user.is_pin_changed,
        expires_at: ctx.session.expires_at,
        user: ctx.user.summary(),
    })
}

pub(crate) async fn change_pin(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    ApiJson(body): ApiJson<ChangePinRequest>,
) -> Result<Response> {
    state
        .auth
        .change_pin(&ctx, &body.current_pin, &body.new_pin, &body.confirm_pin)?;
    Ok(message("PIN changed successfully"))
}

pub(crate) async fn reset_pin(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let user = state.auth.reset_pin(parse_id("User", &id)?)?;
    Ok(ok_with_message(
        user,
        "PIN reset to the resident's birth date (MMDDYY)",
    ))
}

pub(crate) async fn unlock(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let user = state.auth.unlock(parse_id("User", &id)?)?;
    Ok(ok_with_message(user, "Account unlocked"))
}
