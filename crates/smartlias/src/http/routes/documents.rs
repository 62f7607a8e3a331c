//! `/api/documents/*`. Residents only ever see their own requests.

use axum::extract::{Path, State};
use axum::response::Response;

use crate::auth::AuthContext;
use crate::documents::{DocumentFilter, DocumentInput, StatusChange};
use crate::error::{Error, Result};
use crate::http::extract::{AdminUser, ApiJson, ApiQuery, CurrentUser};
use crate::http::response::{created, ok, ok_with_message};
use crate::http::AppState;
use crate::residents::parse_id;

fn own_resident_id(state: &AppState, ctx: &AuthContext) -> Result<Option<i64>> {
    Ok(state.residents.for_user(ctx.user.id)?.map(|r| r.id))
}

pub(crate) async fn list(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    ApiQuery(mut filter): ApiQuery<DocumentFilter>,
) -> Result<Response> {
    if !ctx.is_admin() {
        match own_resident_id(&state, &ctx)? {
            Some(id) => filter.resident_id = Some(id),
            None => return Ok(ok(Vec::<()>::new())),
        }
    }
    Ok(ok(state.documents.list(&filter)?))
}

pub(crate) async fn create(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    ApiJson(body): ApiJson<DocumentInput>,
) -> Result<Response> {
    let resident_id = if ctx.is_admin() {
        body.resident_id
            .ok_or_else(|| Error::validation("resident_id", "Resident is required"))?
    } else {
        own_resident_id(&state, &ctx)?.ok_or_else(|| {
            Error::validation(
                "resident_id",
                "No resident record is linked to this account",
            )
        })?
    };
    let request = state
        .documents
        .create(resident_id, body.document_type, &body.purpose)?;
    Ok(created(request, "Document request submitted"))
}

pub(crate) async fn get(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let request = state.documents.get(parse_id("Document request", &id)?)?;
    if !ctx.is_admin() && own_resident_id(&state, &ctx)? != Some(request.resident_id) {
        return Err(Error::Forbidden);
    }
    Ok(ok(request))
}

pub(crate) async fn update_status(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusChange>,
) -> Result<Response> {
    let request = state
        .documents
        .transition(parse_id("Document request", &id)?, &body)?;
    Ok(ok_with_message(request, "Document request updated"))
}
