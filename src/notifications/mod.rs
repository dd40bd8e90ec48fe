//! Web push notification core.
//!
//! Keeps the registry of browser push subscriptions and fans notifications
//! out to them.
//!
//! # Architecture
//!
//! ```text
//! POST /api/notify
//!     ↓
//! Dispatcher takes a registry snapshot
//!     ↓
//! One concurrent web push (RFC 8030) per subscription, each with a timeout
//!     ↓
//! 410 Gone → registry.remove(endpoint)      other failures → counted only
//!     ↓
//! DispatchSummary { successful, failed, total }
//! ```
//!
//! # VAPID Keys
//!
//! The server signs every delivery with a P-256 ECDSA keypair (VAPID,
//! RFC 8292). Browsers receive the public key from `/api/vapidPublicKey`
//! and pass it as `applicationServerKey` when subscribing.
//!
//! # Push Subscriptions
//!
//! Browsers post their push subscription (endpoint + keys) to
//! `/api/subscribe`. The registry stores one record per endpoint and rewrites
//! the whole set through a [`store::SubscriptionStore`] on every change.

// Rust guideline compliant 2026-02

pub mod dispatch;
pub mod payload;
pub mod push;
pub mod registry;
pub mod store;
pub mod subscription;
pub mod vapid;

pub use dispatch::{DeliveryOutcome, DispatchError, DispatchSummary, Dispatcher};
pub use payload::{NotificationPayload, NotifyRequest};
pub use push::{DeliveryFailure, FailureCode, PushSender, WebPushSender};
pub use registry::{RegistryStats, SubscriptionRegistry, SubscriptionSummary};
pub use store::{MemoryStore, PersistenceError, SubscriptionStore};
pub use subscription::{redact_endpoint, NewSubscription, SubscriptionKeys, SubscriptionRecord};
pub use vapid::VapidKeys;
