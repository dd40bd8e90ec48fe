//! On-disk state for surviving restarts.
//!
//! # Storage structure
//!
//! ```text
//! <data_dir>/
//!     subscriptions.json      # Registry: JSON array of subscription records
//!     vapid_keys.json         # Generated VAPID keypair (only when not set via env)
//! ```
//!
//! Both files are written to a sibling temp file and renamed into place, so a
//! concurrent reader sees either the old or the new contents, never a torn
//! write. On Unix both files are `0600`.
//!
//! Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::notifications::store::SubscriptionStore;
use crate::notifications::subscription::SubscriptionRecord;
use crate::notifications::vapid::VapidKeys;

// ============================================================================
// Atomic file writes
// ============================================================================

/// Write `contents` to `path` atomically with owner-only permissions.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    fs::write(&tmp_path, contents)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&tmp_path, perms)
            .with_context(|| format!("Failed to set permissions on {}", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

// ============================================================================
// Subscription Persistence
// ============================================================================

/// Subscription store backed by one JSON file.
///
/// A missing file is an empty registry. The file is rewritten in full on
/// every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`. Nothing is touched until [`Self::init`] or the first
    /// save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the data directory and an empty registry file if none exists.
    pub async fn init(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        self.save(&[]).await?;
        log::info!("Initialized empty subscription file at {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<SubscriptionRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    async fn save(&self, records: &[SubscriptionRecord]) -> Result<()> {
        let content =
            serde_json::to_vec_pretty(records).context("Failed to serialize subscriptions")?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_private(&path, &content))
            .await
            .context("Subscription writer task failed")??;

        log::debug!("Saved {} subscription(s) to {:?}", records.len(), self.path);
        Ok(())
    }
}

// ============================================================================
// VAPID Key Persistence
// ============================================================================

/// Load VAPID keys from `path`. Returns `None` if no key file exists yet.
pub fn load_vapid_keys(path: &Path) -> Result<Option<VapidKeys>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).context("Failed to read VAPID keys file")?;
    let stored: VapidKeys =
        serde_json::from_str(&content).context("Failed to parse VAPID keys file")?;
    // Re-validate: the file may have been edited by hand.
    let keys =
        VapidKeys::from_base64url(stored.public_key_base64url(), stored.private_key_base64url())
            .context("VAPID keys file holds an invalid keypair")?;

    log::info!("[Vapid] Loaded VAPID keys from {:?}", path);
    Ok(Some(keys))
}

/// Save VAPID keys to `path` with owner-only permissions.
pub fn save_vapid_keys(path: &Path, keys: &VapidKeys) -> Result<()> {
    let content = serde_json::to_vec_pretty(keys).context("Failed to serialize VAPID keys")?;
    write_private(path, &content)?;
    log::debug!("[Vapid] Saved VAPID keys to {:?}", path);
    Ok(())
}

/// Resolve the server's VAPID keys.
///
/// 1. `PUBLIC_VAPID_KEY` + `PRIVATE_VAPID_KEY` from the environment
/// 2. `vapid_keys.json` in the data directory
/// 3. A freshly generated pair, saved to `vapid_keys.json`
///
/// Setting only one of the two environment keys is an error.
pub fn load_or_create_vapid_keys(config: &Config) -> Result<VapidKeys> {
    match (&config.vapid_public_key, &config.vapid_private_key) {
        (Some(public), Some(private)) => {
            let keys = VapidKeys::from_base64url(public, private)
                .context("Invalid VAPID keys in PUBLIC_VAPID_KEY / PRIVATE_VAPID_KEY")?;
            log::info!("[Vapid] Using VAPID keys from environment");
            return Ok(keys);
        }
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("PUBLIC_VAPID_KEY and PRIVATE_VAPID_KEY must be set together");
        }
        (None, None) => {}
    }

    let path = config.vapid_keys_path();
    if let Some(keys) = load_vapid_keys(&path)? {
        return Ok(keys);
    }

    let keys = VapidKeys::generate();
    save_vapid_keys(&path, &keys)?;
    log::info!("[Vapid] Generated new VAPID keys and stored them at {:?}", path);
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::subscription::{NewSubscription, SubscriptionKeys};
    use tempfile::TempDir;

    fn record(endpoint: &str) -> SubscriptionRecord {
        SubscriptionRecord::new(NewSubscription {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "p".to_string(),
                auth: "a".to_string(),
            },
            expiration_time: Some(1_700_000_000_000),
        })
    }

    fn config_in(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("subscriptions.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_creates_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/subscriptions.json");
        let store = JsonFileStore::new(&path);

        store.init().await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Vec<SubscriptionRecord> = serde_json::from_str(&content).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn test_init_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("subscriptions.json"));
        store.save(&[record("https://push.example.com/a")]).await.unwrap();

        store.init().await.unwrap();

        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("subscriptions.json"));
        let records = vec![record("https://push.example.com/a"), record("https://push.example.com/b")];

        store.save(&records).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, records);
        assert!(!dir.path().join(".subscriptions.json.tmp").exists(), "temp file left behind");

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"subscribedAt\""));
        assert!(raw.contains("\"expirationTime\""));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subscriptions.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("subscriptions.json"));
        store.save(&[]).await.unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_vapid_keys_generated_once_then_reused() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        let first = load_or_create_vapid_keys(&config).unwrap();
        assert!(config.vapid_keys_path().exists());
        let second = load_or_create_vapid_keys(&config).unwrap();

        assert_eq!(first.public_key_base64url(), second.public_key_base64url());
        assert_eq!(first.private_key_base64url(), second.private_key_base64url());
    }

    #[test]
    fn test_vapid_keys_from_environment_win() {
        let dir = TempDir::new().unwrap();
        let env_keys = VapidKeys::generate();
        let config = Config {
            vapid_public_key: Some(env_keys.public_key_base64url().to_string()),
            vapid_private_key: Some(env_keys.private_key_base64url().to_string()),
            ..config_in(dir.path())
        };

        let keys = load_or_create_vapid_keys(&config).unwrap();

        assert_eq!(keys.public_key_base64url(), env_keys.public_key_base64url());
        assert!(!config.vapid_keys_path().exists(), "env keys are never written to disk");
    }

    #[test]
    fn test_vapid_half_configured_is_error() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            vapid_public_key: Some(VapidKeys::generate().public_key_base64url().to_string()),
            ..config_in(dir.path())
        };
        assert!(load_or_create_vapid_keys(&config).is_err());
    }
}
