use std::fmt;
use std::sync::RwLock;

use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Keychain service name for the persisted credential pair
const SERVICE_NAME: &str = "ticketwallet";

/// Keychain account holding the serialized pair.
/// Both tokens live in a single secret so a write replaces them together.
const ACCOUNT_NAME: &str = "session";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored credentials are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Credential store lock poisoned")]
    Poisoned,
}

/// Access and refresh token, always written and cleared together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .finish()
    }
}

/// Holder of the current session's credential pair.
///
/// Methods are synchronous: every call completes as one step, so a
/// concurrently suspended request can never observe a half-written pair.
pub trait CredentialStore: Send + Sync {
    /// Current pair, or `None` when signed out
    fn get(&self) -> Result<Option<CredentialPair>, StoreError>;

    /// Replace both tokens
    fn set(&self, pair: &CredentialPair) -> Result<(), StoreError>;

    /// Remove both tokens
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Result<Option<CredentialPair>, StoreError> {
        let guard = self.pair.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn set(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let mut guard = self.pair.write().map_err(|_| StoreError::Poisoned)?;
        *guard = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.pair.write().map_err(|_| StoreError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// OS keychain store.
pub struct KeyringStore {
    service: String,
    account: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            account: ACCOUNT_NAME.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, &self.account)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self) -> Result<Option<CredentialPair>, StoreError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(serde_json::from_str(&secret)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let secret = serde_json::to_string(pair)?;
        self.entry()?.set_password(&secret)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
