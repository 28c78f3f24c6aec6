// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Notifier
//!
//! Delivers one-time codes to a user's verified address. Delivery is a side
//! effect of initiation: a failure is reported back as a warning and never
//! undoes the issued challenge.
//!
//! - [`WebhookNotifier`] posts the message to a mail/SMS gateway, signed with
//!   HMAC-SHA256 when a secret is configured.
//! - [`LogNotifier`] only writes a log line. Used when no gateway is set.

use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use sha2::Sha256;
use tracing::{info, warn};
use url::Url;

use crate::challenge::OtpCode;

/// Header carrying the body signature on webhook deliveries.
pub const SIGNATURE_HEADER: &str = "X-Signature";

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notifier configuration invalid: {0}")]
    Config(String),

    #[error("delivery transport failed: {0}")]
    Transport(String),

    #[error("delivery rejected with HTTP {0}")]
    Rejected(u16),
}

/// Sends a one-time code to an address.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_code(&self, to: &str, code: &OtpCode) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct CodeMessage<'a> {
    to: &'a str,
    code: &'a str,
    purpose: &'static str,
}

// =============================================================================
// Webhook
// =============================================================================

/// Posts `{to, code, purpose}` to a delivery gateway.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: Url,
    secret: Option<Vec<u8>>,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, secret: Option<&str>) -> Result<Self, NotifyError> {
        let url = Url::parse(url).map_err(|e| NotifyError::Config(format!("webhook URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            url,
            secret: secret.map(|s| s.as_bytes().to_vec()),
            http,
        })
    }

    fn sign(&self, body: &[u8]) -> Result<Option<String>, NotifyError> {
        let Some(secret) = &self.secret else {
            return Ok(None);
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(secret)
            .map_err(|e| NotifyError::Config(format!("HMAC key: {e}")))?;
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        Ok(Some(format!("sha256={}", Base64::encode_string(&digest))))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_code(&self, to: &str, code: &OtpCode) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(&CodeMessage {
            to,
            code: code.expose(),
            purpose: "transfer_confirmation",
        })
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let mut request = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json");
        if let Some(signature) = self.sign(&body)? {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), to = %mask_address(to), "Code delivery rejected");
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        info!(to = %mask_address(to), "Code delivered");
        Ok(())
    }
}

// =============================================================================
// Log
// =============================================================================

/// Writes the delivery to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_code(&self, to: &str, code: &OtpCode) -> Result<(), NotifyError> {
        #[cfg(feature = "dev")]
        info!(to = %mask_address(to), code = code.expose(), "DEV: one-time code");

        #[cfg(not(feature = "dev"))]
        {
            let _ = code;
            info!(to = %mask_address(to), "One-time code generated (no delivery gateway configured)");
        }
        Ok(())
    }
}

/// `alice@example.com` → `a***@example.com`.
pub fn mask_address(address: &str) -> String {
    match address.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

// =============================================================================
// Test double
// =============================================================================

/// Captures deliveries in memory; can be told to fail.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(String, String)>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Last code sent to `to`.
    pub fn last_code(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(addr, _)| addr == to)
            .map(|(_, code)| code.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_code(&self, to: &str, code: &OtpCode) -> Result<(), NotifyError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(NotifyError::Transport("simulated outage".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.expose().to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{
        body::Bytes,
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
        Router,
    };

    type Captured = Arc<Mutex<Vec<(HeaderMap, Bytes)>>>;

    async fn spawn_gateway(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(captured): State<Captured>, headers: HeaderMap, body: Bytes| async move {
                        captured.lock().unwrap().push((headers, body));
                        status
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), captured)
    }

    fn code(value: &str) -> OtpCode {
        OtpCode::new(value)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn webhook_posts_signed_message() {
        let (url, captured) = spawn_gateway(StatusCode::NO_CONTENT).await;
        let notifier = WebhookNotifier::new(&url, Some("s3cret")).unwrap();
        let otp = code("9F3A0C7E");

        notifier.send_code("alice@example.com", &otp).await.unwrap();

        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (headers, body) = &calls[0];

        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["to"], "alice@example.com");
        assert_eq!(json["code"], otp.expose());
        assert_eq!(json["purpose"], "transfer_confirmation");

        let mut mac = Hmac::<Sha256>::new_from_slice(b"s3cret").unwrap();
        mac.update(body);
        let expected = format!(
            "sha256={}",
            Base64::encode_string(&mac.finalize().into_bytes())
        );
        assert_eq!(headers.get(SIGNATURE_HEADER).unwrap(), expected.as_str());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn webhook_reports_rejection() {
        let (url, _captured) = spawn_gateway(StatusCode::SERVICE_UNAVAILABLE).await;
        let notifier = WebhookNotifier::new(&url, None).unwrap();

        let result = notifier.send_code("bob@example.com", &code("00000000")).await;
        assert!(matches!(result, Err(NotifyError::Rejected(503))));
    }

    #[test]
    fn invalid_webhook_url_is_a_config_error() {
        assert!(matches!(
            WebhookNotifier::new("not a url", None),
            Err(NotifyError::Config(_))
        ));
    }

    #[test]
    fn addresses_are_masked() {
        assert_eq!(mask_address("alice@example.com"), "a***@example.com");
        assert_eq!(mask_address("nobody"), "***");
    }
}
