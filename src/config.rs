//! Configuration loading.
//!
//! Settings come from `config.json` in the config directory, then
//! environment variables override individual fields. VAPID keys are only
//! ever read from the environment and never written back to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::constants;

/// Configuration for the notifyhub server.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// HTTP port.
    pub port: u16,
    /// Directory holding `subscriptions.json` and `vapid_keys.json`.
    pub data_dir: PathBuf,
    /// VAPID `sub` claim (a `mailto:` or `https:` contact URI).
    pub vapid_subject: String,
    /// Per-delivery timeout in seconds.
    pub delivery_timeout_secs: u64,
    /// Push message TTL in seconds.
    pub push_ttl_secs: u32,
    /// Public VAPID key from `PUBLIC_VAPID_KEY` - NOT serialized to disk.
    #[serde(skip)]
    pub vapid_public_key: Option<String>,
    /// Private VAPID key from `PRIVATE_VAPID_KEY` - NOT serialized to disk.
    #[serde(skip)]
    pub vapid_private_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("notifyhub"))
            .unwrap_or_else(|| PathBuf::from("data"));

        Self {
            bind_address: constants::DEFAULT_BIND_ADDRESS.to_string(),
            port: constants::DEFAULT_PORT,
            data_dir,
            vapid_subject: constants::DEFAULT_VAPID_SUBJECT.to_string(),
            delivery_timeout_secs: constants::PUSH_DELIVERY_TIMEOUT.as_secs(),
            push_ttl_secs: constants::PUSH_TTL_SECS,
            vapid_public_key: None,
            vapid_private_key: None,
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// `NOTIFYHUB_CONFIG_DIR` wins; otherwise the platform config directory
    /// (e.g. `~/.config/notifyhub`).
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = env::var("NOTIFYHUB_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("notifyhub"))
    }

    /// Loads configuration from the default config directory, with
    /// environment variable overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_dir()?)
    }

    /// Loads `config.json` from `dir` (defaults if absent), then applies
    /// environment overrides.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(&dir.join("config.json"))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = env::var("NOTIFYHUB_BIND") {
            self.bind_address = bind;
        }

        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.port = port;
            } else {
                log::warn!("Ignoring invalid PORT value {port:?}");
            }
        }

        if let Ok(data_dir) = env::var("NOTIFYHUB_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(subject) = env::var("NOTIFYHUB_VAPID_SUBJECT") {
            self.vapid_subject = subject;
        }

        if let Ok(timeout) = env::var("NOTIFYHUB_DELIVERY_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.delivery_timeout_secs = secs;
            } else {
                log::warn!("Ignoring invalid NOTIFYHUB_DELIVERY_TIMEOUT value {timeout:?}");
            }
        }

        if let Ok(ttl) = env::var("NOTIFYHUB_PUSH_TTL") {
            if let Ok(secs) = ttl.parse::<u32>() {
                self.push_ttl_secs = secs;
            } else {
                log::warn!("Ignoring invalid NOTIFYHUB_PUSH_TTL value {ttl:?}");
            }
        }

        self.vapid_public_key = env::var("PUBLIC_VAPID_KEY").ok().filter(|k| !k.is_empty());
        self.vapid_private_key = env::var("PRIVATE_VAPID_KEY").ok().filter(|k| !k.is_empty());
    }

    /// Per-delivery timeout as a [`Duration`]. Zero falls back to the default.
    pub fn delivery_timeout(&self) -> Duration {
        if self.delivery_timeout_secs == 0 {
            constants::PUSH_DELIVERY_TIMEOUT
        } else {
            Duration::from_secs(self.delivery_timeout_secs)
        }
    }

    /// Path of the subscription registry file.
    pub fn subscriptions_path(&self) -> PathBuf {
        self.data_dir.join(constants::SUBSCRIPTIONS_FILE)
    }

    /// Path of the persisted VAPID keypair.
    pub fn vapid_keys_path(&self) -> PathBuf {
        self.data_dir.join(constants::VAPID_KEYS_FILE)
    }

    /// Socket address for the HTTP listener.
    ///
    /// `bind_address` must be a literal IPv4 or IPv6 address; `::` yields
    /// `[::]:port`.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address {:?}", self.bind_address))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
