#![doc = include_str!("../README.md")]

pub mod api;
pub mod callback;
pub mod config;
pub mod error;
pub mod oauth;
pub mod refresh;
pub mod session;
pub mod store;
pub mod transactions;
pub mod types;

// Re-exports for convenient access
pub use api::{ApiClient, ApiFailure, ApiRequest, ApiResponse, ApiUser, HealthStatus, UserRole};
pub use callback::{CallbackOutcome, CallbackParams};
pub use config::{AppConfig, CALLBACK_PATH};
pub use error::Error;
pub use oauth::{OAuthClient, OAuthConfig, TokenResponse};
pub use refresh::TokenRefresher;
pub use session::{RouteAccess, SessionManager, Transition};
#[cfg(feature = "keyring")]
pub use store::KeyringStore;
pub use store::{FileStore, MemoryStore, TokenStore};
pub use transactions::{
    NewTransaction, RowsPerPage, SortField, SortOrder, Transaction, TransactionKind,
    TransactionPage, TransactionPatch, TransactionQuery, TransactionStatus,
};
pub use types::{AuthStatus, Session, SessionRecord, StoredSession, TokenInfo, User, UserClaims, UserId};
