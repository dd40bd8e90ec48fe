//! notifyhub - web push notification server.
//!
//! Records browser push subscriptions and broadcasts notifications to all of
//! them, pruning endpoints the push service reports as gone.
//!
//! # Architecture
//!
//! - **Registry** - durable set of subscriptions, deduplicated by endpoint
//! - **Dispatcher** - concurrent fan-out with per-endpoint failure isolation
//! - **Push sender** - VAPID-signed, encrypted Web Push delivery
//! - **Server** - axum HTTP API in front of both
//!
//! # Modules
//!
//! - [`notifications`] - registry, dispatcher, push delivery, VAPID keys
//! - [`persistence`] - JSON file store and VAPID key file
//! - [`server`] - HTTP routes
//! - [`config`] - configuration loading

pub mod config;
pub mod constants;
pub mod notifications;
pub mod persistence;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use notifications::{Dispatcher, SubscriptionRegistry};
pub use persistence::JsonFileStore;
pub use server::{build_router, AppState};
