//! Session lifecycle: startup restore, sign-in callback, token hand-out, sign-out.
//!
//! [`SessionManager`] is constructed once and shared (`Arc`) with everything that needs a
//! token. It never navigates by itself: operations that imply a page change return a
//! [`Transition`], and status changes are published on a [`watch`] channel.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock, watch};
use url::Url;

use crate::callback::{CallbackOutcome, CallbackParams};
use crate::error::Error;
use crate::oauth::OAuthClient;
use crate::refresh::TokenRefresher;
use crate::store::TokenStore;
use crate::types::{AuthStatus, Session, TokenInfo, User, UserClaims};

/// Minimum remaining validity for a token handed out by [`SessionManager::access_token`].
pub const TOKEN_REFRESH_BUFFER: Duration = Duration::minutes(5);
/// Lifetime of a session created by a completed sign-in.
pub const SESSION_LIFETIME: Duration = Duration::hours(24);

pub const HOME_ROUTE: &str = "/";
pub const LOGIN_ROUTE: &str = "/login";

/// Navigation the presentation layer should perform after an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Send the browser to the provider's consent screen.
    Authorize(Url),
    /// Go to an application route.
    Navigate(String),
}

/// Decision for a view that requires a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Startup check still running; show a spinner.
    Pending,
    Allowed,
    RedirectToLogin,
}

/// Owns the authentication state for the whole application.
pub struct SessionManager<S> {
    client: Arc<OAuthClient>,
    store: Arc<S>,
    refresher: TokenRefresher<S>,
    session: RwLock<Option<Session>>,
    status: watch::Sender<AuthStatus>,
    // Held across check-and-refresh so concurrent callers share one refresh.
    refresh_guard: Mutex<()>,
}

impl<S: TokenStore> SessionManager<S> {
    /// Create a manager in the `Loading` state. Call [`initialize`](Self::initialize) next.
    #[must_use]
    pub fn new(client: OAuthClient, store: S) -> Self {
        let client = Arc::new(client);
        let store = Arc::new(store);
        let (status, _) = watch::channel(AuthStatus::Loading);
        Self {
            refresher: TokenRefresher::new(client.clone(), store.clone()),
            client,
            store,
            session: RwLock::new(None),
            status,
            refresh_guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    /// Snapshot of the current session, if authenticated.
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn route_access(&self) -> RouteAccess {
        match self.status() {
            AuthStatus::Loading => RouteAccess::Pending,
            AuthStatus::Authenticated => RouteAccess::Allowed,
            AuthStatus::Unauthenticated => RouteAccess::RedirectToLogin,
        }
    }

    /// Restore the persisted session at startup.
    ///
    /// Fails closed: any store or provider problem ends in `Unauthenticated`.
    pub async fn initialize(&self) -> AuthStatus {
        let status = match self.restore().await {
            Ok(Some(session)) => {
                tracing::info!(
                    user_id = %session.user.id,
                    expires = %session.expires,
                    "Restored stored session"
                );
                *self.session.write().await = Some(session);
                AuthStatus::Authenticated
            }
            Ok(None) => {
                *self.session.write().await = None;
                AuthStatus::Unauthenticated
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to restore session. Starting signed out.");
                if let Err(e) = self.store.clear().await {
                    tracing::warn!(error = %e, "Failed to discard unreadable session");
                }
                *self.session.write().await = None;
                AuthStatus::Unauthenticated
            }
        };
        self.status.send_replace(status);
        status
    }

    async fn restore(&self) -> Result<Option<Session>, Error> {
        let record = self.store.load().await?;
        let (Some(shell), Some(tokens)) = (record.session, record.tokens) else {
            tracing::debug!("No stored session");
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc();
        if shell.expires <= now {
            tracing::info!(expires = %shell.expires, "Stored session expired");
            self.store.clear().await?;
            return Ok(None);
        }

        if !tokens.is_expired_at(now) {
            return Ok(Some(Session::from_parts(shell, tokens)));
        }

        let Some(refresh_token) = tokens.refresh_token else {
            tracing::info!("Access token expired and no refresh token stored");
            self.store.clear().await?;
            return Ok(None);
        };

        let _guard = self.refresh_guard.lock().await;
        if !self.refresher.refresh(&refresh_token).await {
            self.store.clear().await?;
            return Ok(None);
        }

        match self.store.load().await?.tokens {
            Some(renewed) => Ok(Some(Session::from_parts(shell, renewed))),
            None => {
                self.store.clear().await?;
                Ok(None)
            }
        }
    }

    /// Start sign-in: the caller should follow the returned [`Transition::Authorize`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationMissing`] if no client id is configured.
    pub fn sign_in(&self) -> Result<Transition, Error> {
        self.client
            .authorization_url()
            .map(Transition::Authorize)
            .inspect_err(|e| tracing::error!(error = %e, "Cannot start sign-in"))
    }

    /// Exchange the callback code, fetch the user, and persist the new session.
    ///
    /// Never fails past this point: errors are logged and reported as `false`.
    pub async fn complete_callback(&self, code: &str) -> bool {
        match self.establish_session(code).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "Sign-in completed");
                *self.session.write().await = Some(session);
                self.status.send_replace(AuthStatus::Authenticated);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to complete OAuth callback");
                false
            }
        }
    }

    async fn establish_session(&self, code: &str) -> Result<Session, Error> {
        let tokens = self.client.exchange_code(code).await?;
        let claims = self.client.fetch_identity(&tokens.access_token).await?;

        let session = Session {
            user: claims.into(),
            tokens,
            expires: OffsetDateTime::now_utc() + SESSION_LIFETIME,
        };

        self.store.save_session(&session.shell()).await?;
        if let Err(e) = self.store.save_tokens(&session.tokens).await {
            if let Err(clear_err) = self.store.clear().await {
                tracing::warn!(error = %clear_err, "Failed to discard partial session");
            }
            return Err(e);
        }
        Ok(session)
    }

    /// Consume the `/auth/callback` redirect and decide where to go next.
    pub async fn handle_callback(&self, params: &CallbackParams) -> Transition {
        match params.outcome() {
            CallbackOutcome::Code(code) => {
                if self.complete_callback(&code).await {
                    Transition::Navigate(HOME_ROUTE.into())
                } else {
                    login_error("callback_failed")
                }
            }
            CallbackOutcome::Denied { error, description } => {
                tracing::warn!(
                    error = %error,
                    description = description.as_deref().unwrap_or("Unknown error"),
                    "OAuth2 error from provider"
                );
                login_error("cancelled")
            }
            CallbackOutcome::MissingCode => {
                tracing::warn!("OAuth callback without authorization code");
                login_error("missing_code")
            }
        }
    }

    /// Clear the stored session and go back to the front page.
    ///
    /// Idempotent: when already signed out, nothing is cleared again. Waits for an
    /// in-flight refresh, so its tokens are cleared too.
    pub async fn sign_out(&self) -> Transition {
        let _guard = self.refresh_guard.lock().await;
        self.sign_out_locked().await
    }

    // Caller holds `refresh_guard`.
    async fn sign_out_locked(&self) -> Transition {
        let mut session = self.session.write().await;
        if session.is_none() && self.status() == AuthStatus::Unauthenticated {
            tracing::debug!("Already signed out");
            return Transition::Navigate(HOME_ROUTE.into());
        }

        if let Err(e) = self.store.clear().await {
            tracing::error!(error = %e, "Failed to clear stored session during sign-out");
        }
        *session = None;
        self.status.send_replace(AuthStatus::Unauthenticated);
        tracing::info!("Signed out");

        Transition::Navigate(HOME_ROUTE.into())
    }

    /// A bearer token valid for at least [`TOKEN_REFRESH_BUFFER`], refreshing once if needed.
    ///
    /// Signs out and returns `None` when no usable token can be obtained.
    pub async fn access_token(&self) -> Option<String> {
        let _guard = self.refresh_guard.lock().await;
        if self.status() == AuthStatus::Unauthenticated {
            return None;
        }
        match self.current_or_refreshed().await {
            Ok(Some(tokens)) => Some(tokens.access_token),
            Ok(None) => {
                // Still under the guard: waiters must find the store already cleared.
                self.sign_out_locked().await;
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stored tokens");
                None
            }
        }
    }

    // Caller holds `refresh_guard`. `Ok(None)` means the session cannot be kept alive.
    async fn current_or_refreshed(&self) -> Result<Option<TokenInfo>, Error> {
        let Some(tokens) = self.store.load().await?.tokens else {
            tracing::debug!("No stored tokens");
            return Ok(None);
        };

        if tokens.is_fresh_at(OffsetDateTime::now_utc(), TOKEN_REFRESH_BUFFER) {
            return Ok(Some(tokens));
        }

        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            tracing::info!("Access token expiring and no refresh token stored");
            return Ok(None);
        };

        tracing::debug!(expires_at = %tokens.expires_at, "Access token expiring, refreshing");
        match self.refresher.try_refresh(refresh_token).await {
            Ok(renewed) => {
                self.replace_tokens(&renewed).await;
                Ok(Some(renewed))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                Ok(None)
            }
        }
    }

    /// Refresh with the stored refresh token. `false` if none is stored or the refresh fails.
    pub async fn refresh_token(&self) -> bool {
        let _guard = self.refresh_guard.lock().await;
        let refresh_token = match self.store.load().await {
            Ok(record) => record.tokens.and_then(|t| t.refresh_token),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stored tokens");
                return false;
            }
        };
        let Some(refresh_token) = refresh_token else {
            return false;
        };

        match self.refresher.try_refresh(&refresh_token).await {
            Ok(renewed) => {
                self.replace_tokens(&renewed).await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                false
            }
        }
    }

    /// Current identity claims from the provider, for the profile view.
    pub async fn fetch_claims(&self) -> Option<UserClaims> {
        let token = self.access_token().await?;
        self.client
            .fetch_identity(&token)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to fetch profile claims"))
            .ok()
    }

    async fn replace_tokens(&self, renewed: &TokenInfo) {
        if let Some(session) = self.session.write().await.as_mut() {
            session.tokens = renewed.clone();
        }
    }
}

fn login_error(code: &str) -> Transition {
    let encoded = urlencoding::encode(code);
    Transition::Navigate(format!("{LOGIN_ROUTE}?error={encoded}"))
}
