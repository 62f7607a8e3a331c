//! Fixed-window request limits per client and scope.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::config::Config;

use super::response::rate_limited;
use super::AppState;

/// Client key used when no address header is present.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Windows are swept once the map grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

/// Maxima applied in development mode.
const DEV_GENERAL_MAX: u32 = 1000;
const DEV_AUTH_MAX: u32 = 1000;
const DEV_PIN_CHANGE_MAX: u32 = 200;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// One limiter scope, e.g. login attempts.
#[derive(Debug)]
pub struct RateLimiter {
    scope: &'static str,
    max: u32,
    window: Duration,
    message: &'static str,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Allow `max` requests per `window` per client.
    #[must_use]
    pub fn new(scope: &'static str, max: u32, window: Duration, message: &'static str) -> Self {
        Self {
            scope,
            max,
            window,
            message,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Message returned to limited clients.
    #[must_use]
    pub fn message(&self) -> &'static str {
        self.message
    }

    /// Count a request from `client` at `now`.
    ///
    /// # Errors
    ///
    /// Returns how long the client must wait when the request is over the
    /// limit.
    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), Duration> {
        let Ok(mut windows) = self.windows.lock() else {
            // Poisoned: fail open.
            return Ok(());
        };
        if windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.max {
            let elapsed = now.duration_since(entry.started);
            return Err(self.window.saturating_sub(elapsed));
        }
        entry.count += 1;
        Ok(())
    }

    /// Count a request from `client` now.
    ///
    /// # Errors
    ///
    /// Returns the remaining wait when the client is over the limit.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        self.check_at(client, Instant::now())
    }
}

/// The three limiter scopes.
#[derive(Debug)]
pub struct RateLimits {
    enabled: bool,
    /// Every API request.
    pub general: RateLimiter,
    /// Username checks and logins.
    pub auth: RateLimiter,
    /// PIN changes.
    pub pin_change: RateLimiter,
}

fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}

impl RateLimits {
    /// Build limiters from `[rate_limit]`; development mode raises maxima.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let rl = &config.rate_limit;
        let dev = config.server.development;
        let max = |configured: u32, dev_max: u32| {
            if dev {
                configured.max(dev_max)
            } else {
                configured
            }
        };
        Self {
            enabled: rl.enabled,
            general: RateLimiter::new(
                "general",
                max(rl.general_max, DEV_GENERAL_MAX),
                minutes(rl.general_window_minutes),
                "Too many requests. Please try again later.",
            ),
            auth: RateLimiter::new(
                "auth",
                max(rl.auth_max, DEV_AUTH_MAX),
                minutes(rl.auth_window_minutes),
                "Too many authentication attempts. Please try again later.",
            ),
            pin_change: RateLimiter::new(
                "pin_change",
                max(rl.pin_change_max, DEV_PIN_CHANGE_MAX),
                minutes(rl.pin_change_window_minutes),
                "Too many PIN change attempts. Please try again later.",
            ),
        }
    }

    /// Whether limits are enforced.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Identify the client: first `x-forwarded-for` entry, then `x-real-ip`.
#[must_use]
pub fn client_key(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}

async fn enforce(limiter: &RateLimiter, enabled: bool, request: Request, next: Next) -> Response {
    if enabled {
        let client = client_key(request.headers());
        if let Err(retry_after) = limiter.check(&client) {
            warn!(scope = limiter.scope, client = %client, "Rate limit exceeded");
            return rate_limited(limiter.message(), retry_after);
        }
    }
    next.run(request).await
}

pub(crate) async fn general_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.limits.general, state.limits.enabled(), request, next).await
}

pub(crate) async fn auth_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.limits.auth, state.limits.enabled(), request, next).await
}

pub(crate) async fn pin_change_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.limits.pin_change, state.limits.enabled(), request, next).await
}
