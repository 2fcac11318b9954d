//! Application configuration management.
//!
//! This module handles loading the client configuration: the API
//! base URL, the refresh endpoint, the request timeout and where the
//! credential pair is kept.
//!
//! Configuration is stored at `~/.config/ticketwallet/config.json`, and
//! `TICKETWALLET_*` environment variables override individual fields.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{AccountService, AuthClient, HttpTransport, DEFAULT_REFRESH_PATH};
use crate::auth::{CredentialStore, FileStore, KeyringStore, MemoryStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "ticketwallet";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Request timeout; matches what the web front end allowed before giving up.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

const ENV_BASE_URL: &str = "TICKETWALLET_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "TICKETWALLET_TIMEOUT_SECS";
const ENV_STORE: &str = "TICKETWALLET_STORE";

/// Where the credential pair lives between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Keyring,
    File,
    Memory,
}

impl StoreKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyring" => Some(StoreKind::Keyring),
            "file" => Some(StoreKind::File),
            "memory" => Some(StoreKind::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub refresh_path: String,
    pub timeout_secs: u64,
    pub store: StoreKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            store: StoreKind::default(),
        }
    }
}

impl Config {
    /// Load from the config file (defaults if absent), then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Override fields from `lookup`, normally the process environment
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))?;
        }
        if let Some(kind) = lookup(ENV_STORE) {
            self.store = StoreKind::parse(&kind)
                .ok_or_else(|| anyhow::anyhow!("{} must be keyring, file or memory", ENV_STORE))?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the configured credential store
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.store {
            StoreKind::Keyring => Arc::new(KeyringStore::new()),
            StoreKind::File => Arc::new(FileStore::new(self.cache_dir()?)),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }

    /// Wire transport, store and client into an `AccountService`
    pub fn account_service(&self) -> Result<AccountService> {
        let transport = HttpTransport::new(self.base_url.as_str(), self.timeout())
            .context("Failed to build HTTP client")?;
        let client = AuthClient::new(transport, self.credential_store()?)
            .with_refresh_path(self.refresh_path.as_str());
        Ok(AccountService::new(client))
    }
}
