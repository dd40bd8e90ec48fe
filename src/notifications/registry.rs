//! Subscription registry.
//!
//! Owns the durable set of push subscriptions. Every mutation is a full
//! read-modify-write of the stored set, so mutations are funnelled through a
//! single async mutex; without it a broadcast pruning a dead endpoint and a
//! new subscriber registering at the same moment would lose one update.
//!
//! Reads go straight to the store and do not wait for the lock.

// Rust guideline compliant 2026-02

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::store::{PersistenceError, SubscriptionStore};
use super::subscription::{redact_endpoint, SubscriptionRecord};

/// Redacted view of one subscription for stats consumers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    /// Shortened endpoint. Never the full value.
    pub endpoint: String,
    /// Registration time.
    pub subscribed_at: DateTime<Utc>,
}

/// Registry statistics safe to expose to API clients.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    /// Number of registered subscriptions.
    pub total_subscribers: usize,
    /// One redacted entry per subscription.
    pub subscriptions: Vec<SubscriptionSummary>,
}

/// The set of active push subscriptions.
///
/// Constructed once at service start and shared by reference (`Arc`) with
/// the dispatcher and the HTTP layer.
pub struct SubscriptionRegistry {
    store: Arc<dyn SubscriptionStore>,
    /// Serializes read-modify-write cycles on the store.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry").finish_non_exhaustive()
    }
}

impl SubscriptionRegistry {
    /// Create a registry over `store`.
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Register a subscription.
    ///
    /// Deduplicates by endpoint: if the endpoint is already registered the
    /// existing record (and its original `subscribed_at`) is kept. Returns
    /// `true` if the record was inserted. The stored set is rewritten either
    /// way.
    pub async fn add(&self, record: SubscriptionRecord) -> Result<bool, PersistenceError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.store.load().await.map_err(PersistenceError::Read)?;
        let exists = records.iter().any(|r| r.endpoint == record.endpoint);

        if exists {
            log::debug!(
                "[Registry] Already subscribed: {}",
                record.redacted_endpoint()
            );
        } else {
            log::info!("[Registry] New subscription: {}", record.redacted_endpoint());
            records.push(record);
        }

        self.store
            .save(&records)
            .await
            .map_err(PersistenceError::Write)?;

        Ok(!exists)
    }

    /// Remove every subscription with this endpoint.
    ///
    /// Idempotent: an unknown endpoint is not an error. Returns how many
    /// records were removed (zero or one while the uniqueness invariant
    /// holds).
    pub async fn remove(&self, endpoint: &str) -> Result<usize, PersistenceError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.store.load().await.map_err(PersistenceError::Read)?;
        let before = records.len();
        records.retain(|r| r.endpoint != endpoint);
        let removed = before - records.len();

        self.store
            .save(&records)
            .await
            .map_err(PersistenceError::Write)?;

        if removed > 0 {
            log::info!("[Registry] Removed subscription: {}", redact_endpoint(endpoint));
        }
        Ok(removed)
    }

    /// Current snapshot of all subscriptions.
    ///
    /// Read fresh from the store on every call. If the store cannot be read
    /// the registry reports itself empty instead of failing the caller.
    pub async fn list(&self) -> Vec<SubscriptionRecord> {
        match self.store.load().await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("[Registry] Could not read subscriptions, treating as empty: {e:#}");
                Vec::new()
            }
        }
    }

    /// Number of registered subscriptions.
    pub async fn count(&self) -> usize {
        self.list().await.len()
    }

    /// Redacted statistics for API consumers.
    pub async fn stats(&self) -> RegistryStats {
        let records = self.list().await;
        RegistryStats {
            total_subscribers: records.len(),
            subscriptions: records
                .iter()
                .map(|r| SubscriptionSummary {
                    endpoint: r.redacted_endpoint(),
                    subscribed_at: r.subscribed_at,
                })
                .collect(),
        }
    }
}
