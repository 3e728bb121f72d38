#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use svennes_accounts::{
    Error, MemoryStore, OAuthClient, OAuthConfig, SessionManager, SessionRecord, StoredSession,
    TokenInfo, TokenStore, User, UserId,
};
use time::{Duration, OffsetDateTime};
use tracing_subscriber::EnvFilter;
use wiremock::MockServer;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Memory store that counts how often it was cleared.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    clears: AtomicUsize,
}

impl CountingStore {
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl TokenStore for CountingStore {
    async fn load(&self) -> Result<SessionRecord, Error> {
        self.inner.load().await
    }

    async fn save_session(&self, session: &StoredSession) -> Result<(), Error> {
        self.inner.save_session(session).await
    }

    async fn save_tokens(&self, tokens: &TokenInfo) -> Result<(), Error> {
        self.inner.save_tokens(tokens).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await
    }
}

/// Memory store whose token writes always fail.
#[derive(Debug, Default)]
pub struct TokenWriteFailingStore {
    inner: MemoryStore,
}

impl TokenStore for TokenWriteFailingStore {
    async fn load(&self) -> Result<SessionRecord, Error> {
        self.inner.load().await
    }

    async fn save_session(&self, session: &StoredSession) -> Result<(), Error> {
        self.inner.save_session(session).await
    }

    async fn save_tokens(&self, _tokens: &TokenInfo) -> Result<(), Error> {
        Err(Error::Store("auth_tokens: disk full".into()))
    }

    async fn clear(&self) -> Result<(), Error> {
        self.inner.clear().await
    }
}

/// OAuth client whose token and userinfo endpoints point at `server`.
pub fn oauth_client(server: &MockServer) -> OAuthClient {
    let config = OAuthConfig::new(
        "test-client",
        "test-secret",
        "http://localhost:5173/auth/callback".parse().unwrap(),
    )
    .with_token_url(format!("{}/token", server.uri()).parse().unwrap())
    .with_userinfo_url(format!("{}/userinfo", server.uri()).parse().unwrap());
    OAuthClient::new(config)
}

pub fn camper() -> User {
    User {
        id: UserId::from("1170000000000000001".to_string()),
        name: Some("Happy Camper".into()),
        email: Some("camper@example.com".into()),
        image: None,
    }
}

pub fn tokens(access: &str, refresh: Option<&str>, expires_in: Duration) -> TokenInfo {
    TokenInfo {
        access_token: access.into(),
        refresh_token: refresh.map(str::to_owned),
        expires_at: OffsetDateTime::now_utc() + expires_in,
        token_type: "Bearer".into(),
    }
}

/// Persist a session shell ending `session_in` from now, plus the given tokens.
pub async fn seed<S: TokenStore>(store: &S, session_in: Duration, tokens: &TokenInfo) {
    store
        .save_session(&StoredSession {
            user: camper(),
            expires: OffsetDateTime::now_utc() + session_in,
        })
        .await
        .unwrap();
    store.save_tokens(tokens).await.unwrap();
}

/// Seed `store`, build a manager against `server`, and run the startup check.
pub async fn signed_in<S: TokenStore>(
    server: &MockServer,
    store: S,
    tokens: &TokenInfo,
) -> Arc<SessionManager<S>> {
    seed(&store, Duration::hours(12), tokens).await;
    let manager = Arc::new(SessionManager::new(oauth_client(server), store));
    manager.initialize().await;
    manager
}
