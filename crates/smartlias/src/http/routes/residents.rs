//! `/api/residents/*`.

use axum::extract::{Path, State};
use axum::response::Response;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::http::extract::{AdminUser, ApiJson, ApiQuery, CurrentUser};
use crate::http::response::{created, message, ok, ok_with_message};
use crate::http::AppState;
use crate::residents::{parse_id, ResidentInput, ResidentQuery};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    search: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRequest {
    #[serde(flatten)]
    resident: ResidentInput,
    #[serde(default, alias = "createAccount")]
    create_account: bool,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Response> {
    let query = ResidentQuery::new(params.search.as_deref(), params.page, params.limit)?;
    Ok(ok(state.residents.list(&query)?))
}

pub(crate) async fn stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Response> {
    Ok(ok(state.residents.stats()?))
}

/// Staff may view anyone; a resident may view only their own record.
pub(crate) async fn get(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id("Resident", &id)?;
    if !ctx.is_admin() {
        let own = state.residents.for_user(ctx.user.id)?.map(|r| r.id);
        if own != Some(id) {
            return Err(Error::Forbidden);
        }
    }
    Ok(ok(state.residents.get(id)?))
}

pub(crate) async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiJson(body): ApiJson<CreateRequest>,
) -> Result<Response> {
    let result = state.residents.create(&body.resident, body.create_account)?;
    Ok(created(result, "Resident created successfully"))
}

pub(crate) async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ResidentInput>,
) -> Result<Response> {
    let resident = state.residents.update(parse_id("Resident", &id)?, &body)?;
    Ok(ok_with_message(resident, "Resident updated successfully"))
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Response> {
    state.residents.deactivate(parse_id("Resident", &id)?)?;
    Ok(message("Resident deleted successfully"))
}

pub(crate) async fn activate(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let resident = state.residents.activate(parse_id("Resident", &id)?)?;
    Ok(ok_with_message(resident, "Resident activated successfully"))
}
