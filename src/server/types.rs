//! Request and response bodies for the HTTP API.
//!
//! Field names follow the browser client's camelCase conventions.

use serde::{Deserialize, Serialize};

/// `GET /api/vapidPublicKey` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKeyResponse {
    /// Base64url VAPID public key for `applicationServerKey`.
    pub public_key: String,
}

/// `POST /api/unsubscribe` request.
#[derive(Debug, Clone, Deserialize)]
pub struct UnsubscribeRequest {
    /// Endpoint to drop.
    pub endpoint: String,
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable status.
    pub message: String,
}

impl MessageResponse {
    /// Wrap a status message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `POST /api/notify` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyResponse {
    /// Human-readable status.
    pub message: String,
    /// Deliveries the push services accepted.
    pub successful: usize,
    /// Deliveries that failed.
    pub failed: usize,
    /// Subscribers at the start of the broadcast.
    pub total: usize,
}

/// Error body for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// What went wrong.
    pub error: String,
}
