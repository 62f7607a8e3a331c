//! SMS gateways.
//!
//! A gateway sends one message to one number. Sends are not retried or
//! batched; each outcome is recorded as a delivery by the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{SmsConfig, SmsProvider};
use crate::error::{Error, Result};
use crate::model::Announcement;

/// A provider that delivers text messages.
#[async_trait]
pub trait SmsGateway: Send + Sync + fmt::Debug {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Send `message` to a normalised `+639XXXXXXXXX` number.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the message or cannot be
    /// reached.
    async fn send(&self, to: &str, message: &str) -> Result<()>;
}

/// Build the SMS text for an announcement.
#[must_use]
pub fn compose_message(announcement: &Announcement) -> String {
    let prefix = if announcement.is_urgent { "[URGENT] " } else { "" };
    format!(
        "{prefix}{}\n\n{}",
        announcement.title, announcement.content
    )
}

/// Build the gateway selected in `[sms]`, or `None` when SMS is disabled.
///
/// # Errors
///
/// Returns an error if the HTTP provider is selected without a URL or the
/// HTTP client cannot be built.
pub fn gateway_from_config(config: &SmsConfig) -> Result<Option<Arc<dyn SmsGateway>>> {
    if !config.enabled {
        return Ok(None);
    }
    let gateway: Arc<dyn SmsGateway> = match config.provider {
        SmsProvider::Log => Arc::new(LogGateway::new(config.sender_name.clone())),
        SmsProvider::Http => {
            let url = config
                .api_url
                .clone()
                .ok_or_else(|| Error::ConfigValidation {
                    message: "sms.api_url is required for the http provider".to_string(),
                })?;
            Arc::new(HttpGateway::new(
                url,
                config.api_key.clone(),
                config.sender_name.clone(),
                Duration::from_secs(config.timeout_secs),
            )?)
        }
    };
    info!("SMS gateway: {}", gateway.name());
    Ok(Some(gateway))
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Clone)]
pub struct LogGateway {
    sender_name: String,
}

impl LogGateway {
    /// Create a logging gateway.
    #[must_use]
    pub fn new(sender_name: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
        }
    }
}

#[async_trait]
impl SmsGateway for LogGateway {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, to: &str, message: &str) -> Result<()> {
        info!(
            sender = %self.sender_name,
            to,
            chars = message.chars().count(),
            "SMS (not sent, log provider)"
        );
        debug!("SMS body: {message}");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    message: &'a str,
    sender_name: &'a str,
}

/// Posts messages as JSON to an SMS provider's HTTP API.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    url: String,
    api_key: Option<String>,
    sender_name: String,
}

impl HttpGateway {
    /// Create an HTTP gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        sender_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
            sender_name: sender_name.into(),
        })
    }
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("sender_name", &self.sender_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SmsGateway for HttpGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, to: &str, message: &str) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&SendRequest {
            to,
            message,
            sender_name: &self.sender_name,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::sms_gateway(format!(
                "provider returned {status}: {}",
                body.trim()
            )));
        }
        debug!("SMS to {to} accepted ({status})");
        Ok(())
    }
}

/// Records sends in memory; numbers in `failing` are rejected.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingGateway {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
    pub failing: Vec<String>,
}

#[cfg(test)]
#[async_trait]
impl SmsGateway for RecordingGateway {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, to: &str, message: &str) -> Result<()> {
        if self.failing.iter().any(|n| n == to) {
            return Err(Error::sms_gateway(format!("{to} rejected")));
        }
        self.sent
            .lock()
            .map_err(|_| Error::internal("recording gateway lock poisoned"))?
            .push((to.to_string(), message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Mutex;

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn provider(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/send",
                post(
                    move |State(log): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<serde_json::Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        log.lock().unwrap().push((auth, body));
                        (status, "queued")
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/send"), captured)
    }

    #[test]
    fn test_compose_message() {
        let mut a = contract::announcement("Medical mission");
        assert_eq!(
            compose_message(&a),
            "Medical mission\n\nFree check-ups at the barangay hall on Saturday morning."
        );
        a.is_urgent = true;
        assert!(compose_message(&a).starts_with("[URGENT] Medical mission"));
    }

    #[test]
    fn test_gateway_from_config() {
        let mut config = SmsConfig {
            enabled: false,
            ..SmsConfig::default()
        };
        assert!(gateway_from_config(&config).unwrap().is_none());

        config.enabled = true;
        config.provider = SmsProvider::Log;
        assert_eq!(gateway_from_config(&config).unwrap().unwrap().name(), "log");

        config.provider = SmsProvider::Http;
        config.api_url = None;
        assert!(gateway_from_config(&config).is_err());
        config.api_url = Some("http://127.0.0.1:1/send".to_string());
        assert_eq!(gateway_from_config(&config).unwrap().unwrap().name(), "http");
    }

    #[tokio::test]
    async fn test_log_gateway_always_succeeds() {
        LogGateway::new("BRGY")
            .send("+639171234567", "hello")
            .await
            .unwrap();
    }

    #[test]
    fn test_http_gateway_debug_hides_api_key() {
        let gateway = HttpGateway::new(
            "https://sms.example.ph/v1/send",
            Some("sk-live-123".to_string()),
            "BRGY",
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{gateway:?}");
        assert!(!debug.contains("sk-live-123"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("sms.example.ph"));
    }

    #[tokio::test]
    async fn test_http_gateway_posts_json() {
        let (url, captured) = provider(StatusCode::OK).await;
        let gateway = HttpGateway::new(
            url,
            Some("secret-key".to_string()),
            "BRGY",
            Duration::from_secs(5),
        )
        .unwrap();
        gateway.send("+639171234567", "Hello residents").await.unwrap();

        let log = captured.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0.as_deref(), Some("Bearer secret-key"));
        assert_eq!(log[0].1["to"], "+639171234567");
        assert_eq!(log[0].1["message"], "Hello residents");
        assert_eq!(log[0].1["sender_name"], "BRGY");
    }

    #[tokio::test]
    async fn test_http_gateway_reports_provider_errors() {
        let (url, _) = provider(StatusCode::BAD_REQUEST).await;
        let gateway = HttpGateway::new(url, None, "BRGY", Duration::from_secs(5)).unwrap();
        let err = gateway.send("+639171234567", "Hello").await.unwrap_err();
        assert!(matches!(err, Error::SmsGateway(_)));
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_recording_gateway_fails_listed_numbers() {
        let gateway = RecordingGateway {
            failing: vec!["+639170000000".to_string()],
            ..RecordingGateway::default()
        };
        gateway.send("+639171234567", "hi").await.unwrap();
        assert!(gateway.send("+639170000000", "hi").await.is_err());
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
    }
}
