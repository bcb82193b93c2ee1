//! Outbound webhook notification sink.
//!
//! Posts each finalized contact request as JSON to a staff-facing endpoint.
//! When a shared secret is configured the body is signed with HMAC-SHA256
//! and the hex digest sent in `X-Admitline-Signature: sha256=<hex>`.

use admitline_core::contact::ContactRequest;
use admitline_core::error::NotifyError;
use admitline_core::notify::NotificationSink;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Admitline-Signature";

/// Webhook sink configuration.
#[derive(Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub shared_secret: Option<String>,
    pub timeout: Duration,
}

pub struct WebhookNotificationSink {
    config: WebhookConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    phone_visible: bool,
    request: &'a ContactRequest,
}

impl WebhookNotificationSink {
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Hex HMAC-SHA256 of `payload`, or `None` without a secret.
    pub fn sign(&self, payload: &[u8]) -> Result<Option<String>, NotifyError> {
        match &self.config.shared_secret {
            None => Ok(None),
            Some(secret) if secret.is_empty() => Ok(None),
            Some(secret) => {
                let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                    .map_err(|e| NotifyError::NotConfigured(format!("HMAC key: {e}")))?;
                mac.update(payload);
                Ok(Some(hex::encode(mac.finalize().into_bytes())))
            }
        }
    }

    /// Check a signature produced by [`sign`](Self::sign). Receivers use the
    /// same routine; comparison is constant-time.
    pub fn verify(secret: &str, payload: &[u8], signature: &str) -> bool {
        let sig_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
        let Ok(provided) = hex::decode(sig_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&provided).is_ok()
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, request: &ContactRequest, phone_visible: bool) -> Result<(), NotifyError> {
        // Callers pass a redacted copy; blank again in case one did not.
        let redacted;
        let request = if phone_visible || request.phone.is_empty() {
            request
        } else {
            redacted = ContactRequest { phone: String::new(), ..request.clone() };
            &redacted
        };

        let body = serde_json::to_vec(&WebhookPayload {
            event: "contact_request.created",
            phone_visible,
            request,
        })
        .map_err(|e| NotifyError::DeliveryFailed(format!("serialize payload: {e}")))?;

        let mut builder = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json");
        if let Some(signature) = self.sign(&body)? {
            builder = builder.header(SIGNATURE_HEADER, format!("sha256={signature}"));
        }

        let response = builder.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout(self.config.timeout.as_secs())
            } else {
                NotifyError::DeliveryFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Webhook rejected notification");
            return Err(NotifyError::DeliveryFailed(format!("status {}", response.status())));
        }

        debug!(reference_id = %request.reference_id, "Webhook notification delivered");
        Ok(())
    }
}
