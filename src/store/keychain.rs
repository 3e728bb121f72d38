use keyring::Entry;

use super::{SESSION_KEY, TOKENS_KEY, TokenStore, decode, encode};
use crate::error::Error;
use crate::types::{SessionRecord, StoredSession, TokenInfo};

const DEFAULT_SERVICE: &str = "svennes-accounts";

/// Store backed by the OS credential vault (Keychain, Credential Manager, Secret Service).
///
/// Each record is one credential under `service`, with the record key as the account name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn read(&self, key: &'static str) -> Result<Option<String>, Error> {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, key).map_err(|e| keyring_error(key, &e))?;
            match entry.get_password() {
                Ok(json) => Ok(Some(json)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(keyring_error(key, &e)),
            }
        })
        .await
        .map_err(|e| Error::Store(format!("keyring task failed: {e}")))?
    }

    async fn write(&self, key: &'static str, json: String) -> Result<(), Error> {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            Entry::new(&service, key)
                .and_then(|entry| entry.set_password(&json))
                .map_err(|e| keyring_error(key, &e))
        })
        .await
        .map_err(|e| Error::Store(format!("keyring task failed: {e}")))?
    }

    async fn remove(&self, key: &'static str) -> Result<(), Error> {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, key).map_err(|e| keyring_error(key, &e))?;
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(keyring_error(key, &e)),
            }
        })
        .await
        .map_err(|e| Error::Store(format!("keyring task failed: {e}")))?
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl TokenStore for KeyringStore {
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
        self.remove(TOKENS_KEY).await
    }
}

fn keyring_error(key: &str, e: &keyring::Error) -> Error {
    tracing::error!(key, error = %e, "Keyring operation failed");
    Error::Store(format!("{key}: {e}"))
}
