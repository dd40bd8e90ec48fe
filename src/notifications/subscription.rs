//! Push subscription records.
//!
//! The serde shape matches the browser's `PushSubscription.toJSON()` output
//! plus a `subscribedAt` timestamp, so the registry file reads like what the
//! browser posted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ENDPOINT_DISPLAY_CHARS;

/// Key material a browser hands out with its subscription.
///
/// The registry stores these verbatim; only the push sender decodes them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
}

/// A subscription as posted by the browser, before it is registered.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Encryption keys for this endpoint.
    pub keys: SubscriptionKeys,
    /// Optional expiry the browser reported (milliseconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
}

/// A registered subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Push service endpoint URL. Unique within the registry.
    pub endpoint: String,
    /// Encryption keys for this endpoint.
    pub keys: SubscriptionKeys,
    /// Optional expiry the browser reported (milliseconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    /// When the subscription was registered. Never changes afterwards.
    pub subscribed_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Stamp a browser subscription with the current time.
    pub fn new(subscription: NewSubscription) -> Self {
        Self::with_timestamp(subscription, Utc::now())
    }

    /// Stamp a browser subscription with an explicit registration time.
    pub fn with_timestamp(subscription: NewSubscription, subscribed_at: DateTime<Utc>) -> Self {
        Self {
            endpoint: subscription.endpoint,
            keys: subscription.keys,
            expiration_time: subscription.expiration_time,
            subscribed_at,
        }
    }

    /// Endpoint shortened for stats and logs.
    pub fn redacted_endpoint(&self) -> String {
        redact_endpoint(&self.endpoint)
    }
}

/// Shorten an endpoint for display.
///
/// Keeps the first [`ENDPOINT_DISPLAY_CHARS`] characters and always appends
/// `...`, so the returned string never equals the full endpoint.
pub fn redact_endpoint(endpoint: &str) -> String {
    let prefix: String = endpoint.chars().take(ENDPOINT_DISPLAY_CHARS).collect();
    format!("{prefix}...")
}
