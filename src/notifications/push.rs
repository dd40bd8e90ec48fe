//! Web push message delivery.
//!
//! Encrypts payloads (RFC 8291), signs them with VAPID (RFC 8292) and sends
//! them to the subscription's push service (RFC 8030). Every attempt ends in
//! either success or a [`DeliveryFailure`] whose [`FailureCode`] tells the
//! dispatcher whether the subscription is dead.

// Rust guideline compliant 2026-02

use async_trait::async_trait;
use std::sync::Arc;

use super::subscription::SubscriptionRecord;
use super::vapid::VapidKeys;
use crate::constants;

/// Why a delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    /// HTTP 410: the endpoint is permanently invalid.
    Gone,
    /// HTTP 429: the push service is throttling us.
    RateLimited,
    /// Any other non-success HTTP status.
    Http(u16),
    /// The attempt did not settle before its deadline.
    Timeout,
    /// Connection, TLS or IO failure before a status was received.
    Transport,
    /// The stored keys or endpoint could not produce a valid message.
    InvalidSubscription,
}

impl FailureCode {
    /// Whether the subscription should be dropped from the registry.
    pub fn is_gone(self) -> bool {
        self == Self::Gone
    }

    /// Classify a push service response status. `None` means success.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            410 => Some(Self::Gone),
            429 => Some(Self::RateLimited),
            other => Some(Self::Http(other)),
        }
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gone => write!(f, "gone (410)"),
            Self::RateLimited => write!(f, "rate limited (429)"),
            Self::Http(status) => write!(f, "HTTP {status}"),
            Self::Timeout => write!(f, "timeout"),
            Self::Transport => write!(f, "transport error"),
            Self::InvalidSubscription => write!(f, "invalid subscription"),
        }
    }
}

/// A failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Classification used for pruning decisions.
    pub code: FailureCode,
    /// Human-readable detail for logs.
    pub detail: String,
}

impl DeliveryFailure {
    /// Create a failure with the given code and detail.
    pub fn new(code: FailureCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.detail)
        }
    }
}

impl std::error::Error for DeliveryFailure {}

/// Performs one delivery attempt to one subscription.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver `payload` to `subscription`. No retries.
    async fn send(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), DeliveryFailure>;
}

/// Sends real web push messages with VAPID authentication.
///
/// Uses the `web-push` crate for payload encryption and VAPID signing, then
/// sends the HTTP request via a shared `reqwest::Client` for connection
/// pooling across a broadcast.
#[derive(Debug, Clone)]
pub struct WebPushSender {
    client: reqwest::Client,
    vapid: Arc<VapidKeys>,
    subject: String,
    ttl: u32,
}

impl WebPushSender {
    /// Build a sender with its own HTTP client.
    pub fn new(vapid: Arc<VapidKeys>, subject: impl Into<String>, ttl: u32) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(constants::PUSH_CONNECT_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, vapid, subject, ttl))
    }

    /// Build a sender around a pre-configured HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        vapid: Arc<VapidKeys>,
        subject: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            client,
            vapid,
            subject: subject.into(),
            ttl,
        }
    }

    fn build_message(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<web_push::WebPushMessage, DeliveryFailure> {
        use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

        let invalid = |what: &str, e: web_push::WebPushError| {
            DeliveryFailure::new(FailureCode::InvalidSubscription, format!("{what}: {e}"))
        };

        let sub_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut sig_builder =
            VapidSignatureBuilder::from_base64(self.vapid.private_key_base64url(), &sub_info)
                .map_err(|e| invalid("Failed to build VAPID signature", e))?;
        sig_builder.add_claim("sub", self.subject.as_str());
        let sig = sig_builder
            .build()
            .map_err(|e| invalid("Failed to sign VAPID JWT", e))?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(sig);
        builder.set_ttl(self.ttl);

        builder
            .build()
            .map_err(|e| invalid("Failed to build web push message", e))
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &SubscriptionRecord,
        payload: &[u8],
    ) -> Result<(), DeliveryFailure> {
        let message = self.build_message(subscription, payload)?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request.send().await.map_err(|e| {
            let code = if e.is_timeout() {
                FailureCode::Timeout
            } else {
                FailureCode::Transport
            };
            DeliveryFailure::new(code, format!("Web push HTTP request failed: {e}"))
        })?;
        let status = response.status().as_u16();

        match FailureCode::from_status(status) {
            None => Ok(()),
            Some(FailureCode::Gone) => {
                log::info!(
                    "[WebPush] Subscription expired (410 Gone): {}",
                    subscription.redacted_endpoint()
                );
                Err(DeliveryFailure::new(FailureCode::Gone, ""))
            }
            Some(code) => {
                let body = response.text().await.unwrap_or_default();
                log::warn!(
                    "[WebPush] Send failed ({code}) for {}: {body}",
                    subscription.redacted_endpoint()
                );
                Err(DeliveryFailure::new(code, body))
            }
        }
    }
}
