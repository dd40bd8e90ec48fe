//! HTTP API.
//!
//! Thin axum layer over the registry and dispatcher. No authentication:
//! anyone who can reach the port can subscribe, unsubscribe, or broadcast.
//!
//! | Route                    | Handler                |
//! |--------------------------|------------------------|
//! | `GET /api/vapidPublicKey`| [`vapid_public_key`]   |
//! | `POST /api/subscribe`    | [`subscribe`]          |
//! | `POST /api/unsubscribe`  | [`unsubscribe`]        |
//! | `POST /api/notify`       | [`notify`]             |
//! | `GET /api/stats`         | [`stats`]              |

pub mod types;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::notifications::{
    redact_endpoint, DispatchError, Dispatcher, NewSubscription, NotificationPayload,
    NotifyRequest, PersistenceError, RegistryStats, SubscriptionRecord, SubscriptionRegistry,
};
use types::{ErrorResponse, MessageResponse, NotifyResponse, UnsubscribeRequest, VapidPublicKeyResponse};

/// Shared handler state. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<Dispatcher>,
    vapid_public_key: Arc<str>,
}

impl AppState {
    /// Bundle the long-lived service components.
    ///
    /// The registry handed out to handlers is the dispatcher's own, so
    /// pruning and API writes go through the same single-writer lock.
    pub fn new(dispatcher: Arc<Dispatcher>, vapid_public_key: impl Into<Arc<str>>) -> Self {
        Self {
            registry: Arc::clone(dispatcher.registry()),
            dispatcher,
            vapid_public_key: vapid_public_key.into(),
        }
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/vapidPublicKey", get(vapid_public_key))
        .route("/api/subscribe", post(subscribe))
        .route("/api/unsubscribe", post(unsubscribe))
        .route("/api/notify", post(notify))
        .route("/api/stats", get(stats))
        .with_state(state)
}

/// Return the VAPID public key browsers subscribe with.
pub async fn vapid_public_key(State(state): State<AppState>) -> Json<VapidPublicKeyResponse> {
    log::info!("[Http] GET /api/vapidPublicKey -> 200");
    Json(VapidPublicKeyResponse {
        public_key: state.vapid_public_key.to_string(),
    })
}

/// Register a browser subscription. Re-subscribing is a no-op.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(subscription): Json<NewSubscription>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let record = SubscriptionRecord::new(subscription);
    let endpoint = record.redacted_endpoint();
    let inserted = state.registry.add(record).await?;
    log::info!("[Http] POST /api/subscribe {endpoint} -> 201 (new: {inserted})");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Subscribed successfully")),
    ))
}

/// Drop a subscription. Unknown endpoints are not an error.
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(request): Json<UnsubscribeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.registry.remove(&request.endpoint).await?;
    log::info!(
        "[Http] POST /api/unsubscribe {} -> 200 (removed: {removed})",
        redact_endpoint(&request.endpoint)
    );

    Ok(Json(MessageResponse::new("Unsubscribed successfully")))
}

/// Broadcast a notification to every subscriber.
///
/// The body is optional: an empty body, or one sent without a JSON content
/// type, still broadcasts. Absent fields take their defaults.
pub async fn notify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotifyResponse>, ApiError> {
    let request = parse_notify_request(&body)?;
    let payload = NotificationPayload::from(request);
    let summary = state.dispatcher.broadcast(&payload).await?;
    log::info!(
        "[Http] POST /api/notify -> 200 ({} sent, {} failed, {} total)",
        summary.successful,
        summary.failed,
        summary.total
    );

    Ok(Json(NotifyResponse {
        message: "Notifications sent".to_string(),
        successful: summary.successful,
        failed: summary.failed,
        total: summary.total,
    }))
}

/// Subscriber count and redacted subscription list.
pub async fn stats(State(state): State<AppState>) -> Json<RegistryStats> {
    let stats = state.registry.stats().await;
    log::info!("[Http] GET /api/stats -> 200 ({} subscribers)", stats.total_subscribers);
    Json(stats)
}

/// Whitespace-only bodies count as `{}`.
fn parse_notify_request(body: &[u8]) -> Result<NotifyRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(NotifyRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// Handler failures mapped to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Broadcast with nothing registered.
    NoSubscribers,
    /// Request body could not be parsed.
    BadRequest(String),
    /// Durable state could not be read or written.
    Persistence(PersistenceError),
    /// Any other server-side failure.
    Internal(String),
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        Self::Persistence(err)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NoSubscribers => Self::NoSubscribers,
            DispatchError::Payload(e) => Self::Internal(format!("{e:#}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::NoSubscribers => {
                log::info!("[Http] POST /api/notify -> 400 (no subscribers)");
                (StatusCode::BAD_REQUEST, "No subscribers".to_string())
            }
            Self::BadRequest(message) => {
                log::warn!("[Http] Rejected request: {message}");
                (StatusCode::BAD_REQUEST, message)
            }
            Self::Persistence(err) => {
                log::error!("[Http] {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update subscriptions".to_string(),
                )
            }
            Self::Internal(message) => {
                log::error!("[Http] {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_notify_body_uses_defaults() {
        for body in [&b""[..], &b"  \n"[..]] {
            let request = parse_notify_request(body).unwrap();
            assert!(request.title.is_none());
            assert!(request.body.is_none());
        }
    }

    #[test]
    fn test_notify_body_fields_are_read() {
        let request = parse_notify_request(br#"{"title": "Deploy", "url": "/builds/7"}"#).unwrap();
        assert_eq!(request.title.as_deref(), Some("Deploy"));
        assert_eq!(request.url.as_deref(), Some("/builds/7"));
        assert!(request.icon.is_none());
    }

    #[test]
    fn test_malformed_notify_body_is_bad_request() {
        let err = parse_notify_request(b"{title:").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
