//! Persistence for the session shell and the token record.
//!
//! Both halves live under fixed keys, mirroring the browser layout the front office
//! has always used:
//!
//! | key            | value                          |
//! |----------------|--------------------------------|
//! | `auth_session` | [`StoredSession`] (`{user, expires}`) |
//! | `auth_tokens`  | [`TokenInfo`]                  |
//!
//! Backends implement [`TokenStore`]; session logic never touches the raw keys.

mod file;
#[cfg(feature = "keyring")]
mod keychain;
mod memory;

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::types::{SessionRecord, StoredSession, TokenInfo};

pub use file::FileStore;
#[cfg(feature = "keyring")]
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

/// Key of the persisted session shell.
pub const SESSION_KEY: &str = "auth_session";
/// Key of the persisted token record.
pub const TOKENS_KEY: &str = "auth_tokens";

/// Typed repository over the persisted session state.
///
/// # Example
///
/// ```rust,ignore
/// impl TokenStore for MyStore {
///     async fn load(&self) -> Result<SessionRecord, Error> {
///         Ok(SessionRecord {
///             session: self.db.get("auth_session").await?,
///             tokens: self.db.get("auth_tokens").await?,
///         })
///     }
///     // save_session, save_tokens, clear ...
/// }
/// ```
pub trait TokenStore: Send + Sync + 'static {
    /// Read both records. Missing records are `None`; unreadable ones are errors.
    fn load(&self) -> impl Future<Output = Result<SessionRecord, Error>> + Send;

    /// Overwrite the session shell.
    fn save_session(
        &self,
        session: &StoredSession,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Overwrite the token record.
    fn save_tokens(&self, tokens: &TokenInfo) -> impl Future<Output = Result<(), Error>> + Send;

    /// Remove both records. Clearing an empty store succeeds.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

pub(crate) fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::Store(format!("{key}: {e}")))
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> Result<Option<T>, Error> {
    raw.map(|json| serde_json::from_str(json).map_err(|e| Error::Store(format!("{key}: {e}"))))
        .transpose()
}
