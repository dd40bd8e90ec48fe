//! Persistence collaborator for the subscription registry.
//!
//! A store holds the complete subscription set as one collection. It only
//! supports read-all and write-all; the registry owns every read-modify-write
//! and serializes them, so stores need no locking of their own beyond
//! making each call individually consistent.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use super::subscription::SubscriptionRecord;

/// Durable home of the subscription set.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Read the full set. A store that has never been written returns an
    /// empty vector, not an error.
    async fn load(&self) -> Result<Vec<SubscriptionRecord>>;

    /// Replace the full set.
    async fn save(&self, records: &[SubscriptionRecord]) -> Result<()>;
}

/// Errors from the registry's durable state on a write path.
#[derive(Debug)]
pub enum PersistenceError {
    /// Stored state exists but could not be read or parsed.
    Read(anyhow::Error),
    /// The updated set could not be written.
    Write(anyhow::Error),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "Failed to read subscriptions: {err:#}"),
            Self::Write(err) => write!(f, "Failed to write subscriptions: {err:#}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(err) | Self::Write(err) => Some(err.as_ref()),
        }
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<SubscriptionRecord>>,
}

impl MemoryStore {
    /// Create a store pre-populated with `records`.
    pub fn with_records(records: Vec<SubscriptionRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn load(&self) -> Result<Vec<SubscriptionRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Memory store lock poisoned: {e}"))?;
        Ok(records.clone())
    }

    async fn save(&self, records: &[SubscriptionRecord]) -> Result<()> {
        let mut stored = self
            .records
            .lock()
            .map_err(|e| anyhow::anyhow!("Memory store lock poisoned: {e}"))?;
        *stored = records.to_vec();
        Ok(())
    }
}
