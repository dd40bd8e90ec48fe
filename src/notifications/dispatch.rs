//! Broadcast fan-out.
//!
//! One broadcast delivers a payload to every registered subscription. Each
//! attempt runs concurrently and independently under its own timeout; the
//! broadcast waits for all of them to settle and never short-circuits on a
//! failure. A `Gone` failure removes that endpoint from the registry before
//! the broadcast returns. Nothing is retried.

// Rust guideline compliant 2026-02

use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::payload::NotificationPayload;
use super::push::{DeliveryFailure, FailureCode, PushSender};
use super::registry::SubscriptionRegistry;
use super::subscription::SubscriptionRecord;
use crate::constants;

/// Result of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The push service accepted the message.
    Delivered,
    /// The attempt failed with this code.
    Failed(FailureCode),
}

/// Aggregate counts for one broadcast.
///
/// `successful + failed == total`, and `total` is the number of
/// subscriptions in the snapshot taken at the start of the broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Attempts the push service accepted.
    pub successful: usize,
    /// Attempts that failed for any reason.
    pub failed: usize,
    /// Subscriptions in the snapshot.
    pub total: usize,
    /// Subscriptions removed from the registry because they were gone.
    #[serde(skip)]
    pub pruned: usize,
}

impl DispatchSummary {
    fn from_outcomes(outcomes: &[(DeliveryOutcome, bool)]) -> Self {
        let successful = outcomes
            .iter()
            .filter(|(o, _)| *o == DeliveryOutcome::Delivered)
            .count();
        Self {
            successful,
            failed: outcomes.len() - successful,
            total: outcomes.len(),
            pruned: outcomes.iter().filter(|(_, pruned)| *pruned).count(),
        }
    }
}

/// Errors that fail a whole broadcast.
///
/// Individual delivery failures never appear here; they are counted in the
/// [`DispatchSummary`].
#[derive(Debug)]
pub enum DispatchError {
    /// The registry is empty; no delivery was attempted.
    NoSubscribers,
    /// The payload could not be serialized.
    Payload(anyhow::Error),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSubscribers => write!(f, "No subscribers"),
            Self::Payload(err) => write!(f, "Invalid notification payload: {err:#}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoSubscribers => None,
            Self::Payload(err) => Some(err.as_ref()),
        }
    }
}

/// Delivers notifications to every registered subscription.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    sender: Arc<dyn PushSender>,
    delivery_timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("delivery_timeout", &self.delivery_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with the default per-attempt timeout.
    pub fn new(registry: Arc<SubscriptionRegistry>, sender: Arc<dyn PushSender>) -> Self {
        Self {
            registry,
            sender,
            delivery_timeout: constants::PUSH_DELIVERY_TIMEOUT,
        }
    }

    /// Override the per-attempt timeout.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// The registry this dispatcher reads from and prunes.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Send `payload` to every registered subscription.
    pub async fn broadcast(
        &self,
        payload: &NotificationPayload,
    ) -> Result<DispatchSummary, DispatchError> {
        let snapshot = self.registry.list().await;
        if snapshot.is_empty() {
            log::info!("[Dispatch] Broadcast skipped: no subscribers");
            return Err(DispatchError::NoSubscribers);
        }

        let body = payload.to_bytes().map_err(DispatchError::Payload)?;
        log::info!(
            "[Dispatch] Broadcasting \"{}\" to {} subscriber(s)",
            payload.title,
            snapshot.len()
        );

        let attempts = snapshot.iter().map(|sub| self.deliver(sub, &body));
        let outcomes = join_all(attempts).await;

        let summary = DispatchSummary::from_outcomes(&outcomes);
        log::info!(
            "[Dispatch] Broadcast complete: {} delivered, {} failed, {} pruned",
            summary.successful,
            summary.failed,
            summary.pruned
        );
        Ok(summary)
    }

    /// One attempt, plus registry cleanup if the endpoint is gone.
    ///
    /// Returns the outcome and whether the subscription was removed.
    async fn deliver(&self, subscription: &SubscriptionRecord, body: &[u8]) -> (DeliveryOutcome, bool) {
        let result =
            match tokio::time::timeout(self.delivery_timeout, self.sender.send(subscription, body))
                .await
            {
                Ok(result) => result,
                Err(_elapsed) => Err(DeliveryFailure::new(
                    FailureCode::Timeout,
                    format!("no response within {:?}", self.delivery_timeout),
                )),
            };

        let failure = match result {
            Ok(()) => return (DeliveryOutcome::Delivered, false),
            Err(failure) => failure,
        };

        log::debug!(
            "[Dispatch] Delivery to {} failed: {failure}",
            subscription.redacted_endpoint()
        );

        if !failure.code.is_gone() {
            return (DeliveryOutcome::Failed(failure.code), false);
        }

        let pruned = match self.registry.remove(&subscription.endpoint).await {
            Ok(removed) => removed > 0,
            Err(e) => {
                log::error!(
                    "[Dispatch] Failed to remove gone subscription {}: {e}",
                    subscription.redacted_endpoint()
                );
                false
            }
        };
        (DeliveryOutcome::Failed(FailureCode::Gone), pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::store::MemoryStore;
    use crate::notifications::subscription::{NewSubscription, SubscriptionKeys};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// What the fake push service does for an endpoint.
    #[derive(Clone, Copy)]
    enum Behavior {
        Accept,
        Fail(FailureCode),
        Hang,
    }

    /// Scripted push service that records every attempt.
    #[derive(Default)]
    struct FakeSender {
        behaviors: HashMap<String, Behavior>,
        attempts: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeSender {
        fn with(behaviors: &[(&str, Behavior)]) -> Self {
            Self {
                behaviors: behaviors
                    .iter()
                    .map(|(e, b)| ((*e).to_string(), *b))
                    .collect(),
                ..Self::default()
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PushSender for FakeSender {
        async fn send(
            &self,
            subscription: &SubscriptionRecord,
            _payload: &[u8],
        ) -> Result<(), DeliveryFailure> {
            self.attempts.lock().unwrap().push(subscription.endpoint.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let behavior = self
                .behaviors
                .get(&subscription.endpoint)
                .copied()
                .unwrap_or(Behavior::Accept);
            let result = match behavior {
                Behavior::Accept => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(())
                }
                Behavior::Fail(code) => Err(DeliveryFailure::new(code, "scripted")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn record(endpoint: &str) -> SubscriptionRecord {
        SubscriptionRecord::new(NewSubscription {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "p256dh".to_string(),
                auth: "auth".to_string(),
            },
            expiration_time: None,
        })
    }

    fn setup(
        endpoints: &[&str],
        sender: FakeSender,
    ) -> (Dispatcher, Arc<SubscriptionRegistry>, Arc<FakeSender>) {
        let store = MemoryStore::with_records(endpoints.iter().map(|e| record(e)).collect());
        let registry = Arc::new(SubscriptionRegistry::new(Arc::new(store)));
        let sender = Arc::new(sender);
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&sender) as Arc<dyn PushSender>)
            .with_delivery_timeout(Duration::from_millis(200));
        (dispatcher, registry, sender)
    }

    #[tokio::test]
    async fn test_empty_registry_makes_no_attempts() {
        let (dispatcher, _registry, sender) = setup(&[], FakeSender::default());

        let err = dispatcher
            .broadcast(&NotificationPayload::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NoSubscribers));
        assert!(sender.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_gone_success_transient_scenario() {
        let (dispatcher, registry, sender) = setup(
            &["A", "B", "C"],
            FakeSender::with(&[
                ("A", Behavior::Fail(FailureCode::Gone)),
                ("B", Behavior::Accept),
                ("C", Behavior::Fail(FailureCode::Http(503))),
            ]),
        );
        assert_eq!(registry.count().await, 3);

        let summary = dispatcher
            .broadcast(&NotificationPayload::default())
            .await
            .unwrap();

        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pruned, 1);

        let remaining: Vec<_> = registry.list().await.into_iter().map(|r| r.endpoint).collect();
        assert_eq!(remaining, vec!["B", "C"]);

        let mut attempted = sender.attempts();
        attempted.sort();
        assert_eq!(attempted, vec!["A", "B", "C"], "exactly one attempt each");
    }

    #[tokio::test]
    async fn test_transient_failures_keep_subscriptions() {
        let (dispatcher, registry, _sender) = setup(
            &["rate", "http", "transport", "invalid"],
            FakeSender::with(&[
                ("rate", Behavior::Fail(FailureCode::RateLimited)),
                ("http", Behavior::Fail(FailureCode::Http(500))),
                ("transport", Behavior::Fail(FailureCode::Transport)),
                ("invalid", Behavior::Fail(FailureCode::InvalidSubscription)),
            ]),
        );

        let summary = dispatcher
            .broadcast(&NotificationPayload::default())
            .await
            .unwrap();

        assert_eq!(summary.failed, 4);
        assert_eq!(summary.pruned, 0);
        assert_eq!(registry.count().await, 4);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let (dispatcher, registry, _sender) = setup(
            &["slow", "fast"],
            FakeSender::with(&[("slow", Behavior::Hang)]),
        );

        let started = std::time::Instant::now();
        let summary = dispatcher
            .broadcast(&NotificationPayload::default())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5), "hung attempt was not cut off");
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(registry.count().await, 2, "timed-out endpoint must stay registered");
    }

    #[tokio::test]
    async fn test_counts_match_snapshot_size() {
        let endpoints: Vec<String> = (0..25).map(|i| format!("sub-{i}")).collect();
        let refs: Vec<&str> = endpoints.iter().map(String::as_str).collect();
        let behaviors: Vec<(&str, Behavior)> = refs
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 == 0)
            .map(|(_, e)| (*e, Behavior::Fail(FailureCode::Gone)))
            .collect();
        let (dispatcher, registry, _sender) = setup(&refs, FakeSender::with(&behaviors));

        let count_before = registry.count().await;
        let summary = dispatcher
            .broadcast(&NotificationPayload::default())
            .await
            .unwrap();

        assert_eq!(summary.total, count_before);
        assert_eq!(summary.successful + summary.failed, summary.total);
        assert_eq!(summary.pruned, behaviors.len());
        assert_eq!(registry.count().await, count_before - behaviors.len());
    }

    #[tokio::test]
    async fn test_deliveries_run_concurrently() {
        let endpoints: Vec<String> = (0..10).map(|i| format!("sub-{i}")).collect();
        let refs: Vec<&str> = endpoints.iter().map(String::as_str).collect();
        let (dispatcher, _registry, sender) = setup(&refs, FakeSender::default());

        dispatcher
            .broadcast(&NotificationPayload::default())
            .await
            .unwrap();

        assert!(
            sender.max_in_flight.load(Ordering::SeqCst) > 1,
            "attempts were serialized"
        );
    }

    #[test]
    fn test_summary_serializes_public_counts_only() {
        let summary = DispatchSummary {
            successful: 2,
            failed: 1,
            total: 3,
            pruned: 1,
        };
        let value = serde_json::to_value(summary).unwrap();
        assert_eq!(value, serde_json::json!({"successful": 2, "failed": 1, "total": 3}));
    }
}
