use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credentials::{CredentialPair, CredentialStore, StoreError};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Scratch file the pair is written to before being renamed into place
const SESSION_TMP_FILE: &str = "session.json.tmp";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(flatten)]
    pub credentials: CredentialPair,
    pub saved_at: DateTime<Utc>,
}

/// Credential store persisted as `session.json` in the cache directory.
///
/// Writes go to a temporary file that is renamed over the old one, so a
/// reader sees either the previous pair or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load the full session record, including when it was saved
    pub fn load(&self) -> Result<Option<SessionData>, StoreError> {
        let path = self.session_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Result<Option<CredentialPair>, StoreError> {
        Ok(self.load()?.map(|data| data.credentials))
    }

    fn set(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.cache_dir)?;

        let data = SessionData {
            credentials: pair.clone(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&data)?;

        let tmp = self.cache_dir.join(SESSION_TMP_FILE);
        std::fs::write(&tmp, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, self.session_path())?;
        debug!(path = %self.session_path().display(), "Session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(self.session_path()) {
            Ok(()) => {
                debug!("Session file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
