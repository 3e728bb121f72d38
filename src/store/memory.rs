use std::collections::HashMap;

use tokio::sync::Mutex;

use super::{SESSION_KEY, TOKENS_KEY, TokenStore, decode, encode};
use crate::error::Error;
use crate::types::{SessionRecord, StoredSession, TokenInfo};

/// In-process store holding the serialized records, like browser local storage.
///
/// Nothing survives the process. Useful for tests and for short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<&'static str, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON stored under `key`, if any.
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Store raw JSON under `key`, bypassing serialization.
    pub async fn insert_raw(&self, key: &'static str, json: impl Into<String>) {
        self.entries.lock().await.insert(key, json.into());
    }
}

impl TokenStore for MemoryStore {
    async fn load(&self) -> Result<SessionRecord, Error> {
        let entries = self.entries.lock().await;
        Ok(SessionRecord {
            session: decode(SESSION_KEY, entries.get(SESSION_KEY).map(String::as_str))?,
            tokens: decode(TOKENS_KEY, entries.get(TOKENS_KEY).map(String::as_str))?,
        })
    }

    async fn save_session(&self, session: &StoredSession) -> Result<(), Error> {
        let json = encode(SESSION_KEY, session)?;
        self.entries.lock().await.insert(SESSION_KEY, json);
        Ok(())
    }

    async fn save_tokens(&self, tokens: &TokenInfo) -> Result<(), Error> {
        let json = encode(TOKENS_KEY, tokens)?;
        self.entries.lock().await.insert(TOKENS_KEY, json);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        let mut entries = self.entries.lock().await;
        entries.remove(SESSION_KEY);
        entries.remove(TOKENS_KEY);
        Ok(())
    }
}
