//! Route table.

mod announcements;
mod auth;
mod documents;
mod residents;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use serde::Serialize;

use super::rate_limit::{auth_limit, general_limit, pin_change_limit};
use super::response::{failure, ok};
use super::AppState;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    storage: &'static str,
}

async fn health(State(state): State<AppState>) -> Response {
    ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: state.store.backend_name(),
    })
}

async fn not_found() -> Response {
    failure(axum::http::StatusCode::NOT_FOUND, "Endpoint not found")
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let login_routes = Router::new()
        .route("/api/auth/check-username", post(auth::check_username))
        .route("/api/auth/login", post(auth::login))
        .route_layer(from_fn_with_state(state.clone(), auth_limit));

    let pin_routes = Router::new()
        .route("/api/auth/change-pin", post(auth::change_pin))
        .route_layer(from_fn_with_state(state.clone(), pin_change_limit));

    let api = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/session", get(auth::session))
        .route("/api/residents", get(residents::list).post(residents::create))
        .route("/api/residents/stats", get(residents::stats))
        .route(
            "/api/residents/{id}",
            get(residents::get)
                .put(residents::update)
                .delete(residents::delete),
        )
        .route("/api/residents/{id}/activate", post(residents::activate))
        .route("/api/users/{id}/reset-pin", post(auth::reset_pin))
        .route("/api/users/{id}/unlock", post(auth::unlock))
        .route(
            "/api/announcements",
            get(announcements::list).post(announcements::create),
        )
        .route(
            "/api/announcements/{id}",
            get(announcements::get)
                .put(announcements::update)
                .delete(announcements::delete),
        )
        .route("/api/announcements/{id}/publish", post(announcements::publish))
        .route(
            "/api/announcements/{id}/sms-status",
            get(announcements::sms_status),
        )
        .route("/api/documents", get(documents::list).post(documents::create))
        .route("/api/documents/{id}", get(documents::get))
        .route("/api/documents/{id}/status", put(documents::update_status))
        .merge(login_routes)
        .merge(pin_routes)
        .route_layer(from_fn_with_state(state.clone(), general_limit));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .fallback(not_found)
        .with_state(state)
}
