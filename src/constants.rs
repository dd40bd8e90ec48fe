//! Application-wide constants for notifyhub.
//!
//! Magic numbers and defaults live here, grouped by domain.
//!
//! # Categories
//!
//! - **Server**: bind address and port defaults
//! - **Delivery**: push service timeouts and message lifetime
//! - **Payload**: notification field defaults
//! - **Storage**: file names inside the data directory

use std::time::Duration;

// ============================================================================
// Server
// ============================================================================

/// Default address the HTTP server binds to.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default VAPID `sub` claim. Push services use it to contact the sender.
pub const DEFAULT_VAPID_SUBJECT: &str = "mailto:admin@localhost";

// ============================================================================
// Delivery
// ============================================================================

/// Upper bound on a single delivery attempt.
///
/// Push services occasionally hang. An attempt that exceeds this is recorded
/// as a transient timeout and the subscription is kept.
pub const PUSH_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP connect timeout for the shared push HTTP client.
pub const PUSH_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the push service should hold an undelivered message (24 hours).
pub const PUSH_TTL_SECS: u32 = 86_400;

// ============================================================================
// Payload
// ============================================================================

/// Title used when a notify request omits one.
pub const DEFAULT_TITLE: &str = "Push Notification";

/// Body used when a notify request omits one.
pub const DEFAULT_BODY: &str = "New notification";

/// Icon used when a notify request omits one.
pub const DEFAULT_ICON: &str = "/icon-192.png";

/// Click-through URL used when a notify request omits one.
pub const DEFAULT_URL: &str = "/";

// ============================================================================
// Storage
// ============================================================================

/// Subscription registry file inside the data directory.
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

/// Persisted VAPID keypair inside the data directory.
pub const VAPID_KEYS_FILE: &str = "vapid_keys.json";

/// Number of endpoint characters shown in stats and logs.
pub const ENDPOINT_DISPLAY_CHARS: usize = 50;
