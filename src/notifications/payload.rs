//! Notification payload sent to every subscriber.
//!
//! The service worker reads `title`, `body`, `icon` and `url` from the
//! decrypted push message, so the wire shape is a flat JSON object with
//! exactly those keys.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants;

/// Notify request as clients send it. Every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NotifyRequest {
    /// Notification title.
    #[serde(default)]
    pub title: Option<String>,
    /// Notification body text.
    #[serde(default)]
    pub body: Option<String>,
    /// Icon URL.
    #[serde(default)]
    pub icon: Option<String>,
    /// Click-through URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Fully resolved payload for one broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Icon URL.
    pub icon: String,
    /// Click-through URL.
    pub url: String,
}

impl Default for NotificationPayload {
    fn default() -> Self {
        Self::from(NotifyRequest::default())
    }
}

impl From<NotifyRequest> for NotificationPayload {
    /// Missing and empty fields fall back to the defaults in [`constants`].
    fn from(req: NotifyRequest) -> Self {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        Self {
            title: or_default(req.title, constants::DEFAULT_TITLE),
            body: or_default(req.body, constants::DEFAULT_BODY),
            icon: or_default(req.icon, constants::DEFAULT_ICON),
            url: or_default(req.url, constants::DEFAULT_URL),
        }
    }
}

impl NotificationPayload {
    /// Serialized message body handed to the push sender.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to serialize notification payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request_uses_defaults() {
        let payload: NotificationPayload = serde_json::from_str::<NotifyRequest>("{}")
            .unwrap()
            .into();
        assert_eq!(payload.title, constants::DEFAULT_TITLE);
        assert_eq!(payload.body, constants::DEFAULT_BODY);
        assert_eq!(payload.icon, constants::DEFAULT_ICON);
        assert_eq!(payload.url, constants::DEFAULT_URL);
    }

    #[test]
    fn test_partial_request_keeps_given_fields() {
        let req: NotifyRequest =
            serde_json::from_str(r#"{"title": "Deploy done", "url": "/builds/42", "body": ""}"#)
                .unwrap();
        let payload = NotificationPayload::from(req);

        assert_eq!(payload.title, "Deploy done");
        assert_eq!(payload.url, "/builds/42");
        assert_eq!(payload.body, constants::DEFAULT_BODY, "empty string counts as missing");
    }

    #[test]
    fn test_wire_shape() {
        let bytes = NotificationPayload::default().to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        for key in ["title", "body", "icon", "url"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
