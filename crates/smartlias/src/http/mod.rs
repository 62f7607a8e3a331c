//! JSON API over HTTP.
//!
//! Every response uses the `{success, data, message, error}` envelope.
//! Handlers stay thin: they extract, call one service method and wrap the
//! result.

mod extract;
mod rate_limit;
mod response;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::announcements::{gateway_from_config, AnnouncementService};
use crate::auth::AuthService;
use crate::clock::Clock;
use crate::config::Config;
use crate::documents::DocumentService;
use crate::error::{Error, Result};
use crate::residents::ResidentService;
use crate::storage::Store;

pub use extract::{bearer_token, AdminUser, ApiJson, ApiQuery, CurrentUser};
pub use rate_limit::{client_key, RateLimiter, RateLimits, ANONYMOUS_CLIENT};
pub use response::{status_for, Envelope, SERVER_ERROR_MESSAGE};
pub use routes::router;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The record store.
    pub store: Arc<dyn Store>,
    /// Login and sessions.
    pub auth: Arc<AuthService>,
    /// Resident records.
    pub residents: Arc<ResidentService>,
    /// Announcements and SMS.
    pub announcements: Arc<AnnouncementService>,
    /// Document requests.
    pub documents: Arc<DocumentService>,
    /// Request limits.
    pub limits: Arc<RateLimits>,
}

impl AppState {
    /// Wire every service to `store` according to `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMS gateway cannot be built.
    pub fn new(config: &Config, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Result<Self> {
        let auth = Arc::new(AuthService::from_config(
            config,
            store.clone(),
            clock.clone(),
        ));
        let gateway = gateway_from_config(&config.sms)?;
        Ok(Self {
            residents: Arc::new(ResidentService::new(
                store.clone(),
                clock.clone(),
                auth.clone(),
            )),
            announcements: Arc::new(AnnouncementService::new(
                store.clone(),
                clock.clone(),
                gateway,
            )),
            documents: Arc::new(DocumentService::new(store.clone(), clock)),
            limits: Arc::new(RateLimits::from_config(config)),
            auth,
            store,
        })
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(Duration::from_secs(60 * 60)),
    )
}

/// Serve the API on `bind` until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn serve(state: AppState, bind: &str, cors_origins: &[String]) -> Result<()> {
    let addr: SocketAddr = bind.parse().map_err(|_| Error::ConfigValidation {
        message: format!("invalid bind address: {bind}"),
    })?;

    let mut app = router(state).layer(TraceLayer::new_for_http());
    if let Some(cors) = cors_layer(cors_origins) {
        app = app.layer(cors);
    }

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
