use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{SESSION_KEY, TOKENS_KEY, TokenStore, decode, encode};
use crate::error::Error;
use crate::types::{SessionRecord, StoredSession, TokenInfo};

const APP_DIR: &str = "svennes-accounts";

/// Store keeping each record in its own JSON file (`auth_session.json`, `auth_tokens.json`).
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store records under `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store records in the platform's local data directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the platform has no local data directory.
    pub fn default_location() -> Result<Self, Error> {
        let dir = dirs::data_local_dir()
            .ok_or_else(|| Error::Store("could not determine data directory".into()))?;
        Ok(Self::new(dir.join(APP_DIR)))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn read(&self, key: &str) -> Result<Option<String>, Error> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Store(format!("failed to read {key}: {e}"))),
        }
    }

    async fn write(&self, key: &str, json: String) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Store(format!("failed to create {}: {e}", self.dir.display())))?;
        tokio::fs::write(self.path(key), json)
            .await
            .map_err(|e| Error::Store(format!("failed to write {key}: {e}")))?;
        tracing::debug!(key, dir = %self.dir.display(), "Stored auth record");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Store(format!("failed to remove {key}: {e}"))),
        }
    }
}

impl TokenStore for FileStore {
    async fn load(&self) -> Result<SessionRecord, Error> {
        let session = self.read(SESSION_KEY).await?;
        let tokens = self.read(TOKENS_KEY).await?;
        Ok(SessionRecord {
            session: decode(SESSION_KEY, session.as_deref())?,
            tokens: decode(TOKENS_KEY, tokens.as_deref())?,
        })
    }

    async fn save_session(&self, session: &StoredSession) -> Result<(), Error> {
        self.write(SESSION_KEY, encode(SESSION_KEY, session)?).await
    }

    async fn save_tokens(&self, tokens: &TokenInfo) -> Result<(), Error> {
        self.write(TOKENS_KEY, encode(TOKENS_KEY, tokens)?).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.remove(SESSION_KEY).await?;
        self.remove(TOKENS_KEY).await?;
        tracing::debug!(dir = %self.dir.display(), "Cleared auth records");
        Ok(())
    }
}
