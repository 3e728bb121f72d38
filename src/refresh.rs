use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::Error;
use crate::oauth::OAuthClient;
use crate::store::TokenStore;
use crate::types::TokenInfo;

/// Renews access tokens with a refresh token and persists the result.
pub struct TokenRefresher<S> {
    client: Arc<OAuthClient>,
    store: Arc<S>,
}

// Manual Clone: avoid derive adding `S: Clone` bound.
impl<S> Clone for TokenRefresher<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            store: self.store.clone(),
        }
    }
}

impl<S: TokenStore> TokenRefresher<S> {
    #[must_use]
    pub fn new(client: Arc<OAuthClient>, store: Arc<S>) -> Self {
        Self { client, store }
    }

    /// Refresh and overwrite the stored token record. Returns `false` on any failure.
    pub async fn refresh(&self, refresh_token: &str) -> bool {
        match self.try_refresh(refresh_token).await {
            Ok(tokens) => {
                tracing::info!(expires_at = %tokens.expires_at, "Access token refreshed");
                true
            }
            Err(e) if e.is_rejected() => {
                tracing::info!(error = %e, "Refresh token rejected by provider");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                false
            }
        }
    }

    /// Like [`refresh`](Self::refresh), keeping the new record or the error.
    ///
    /// The previous refresh token is kept when the provider does not issue a new one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationMissing`], [`Error::RefreshFailed`], or
    /// [`Error::Store`] if the new record could not be written.
    pub async fn try_refresh(&self, refresh_token: &str) -> Result<TokenInfo, Error> {
        let response = self.client.refresh_grant(refresh_token).await?;
        let tokens = response.into_token_info(OffsetDateTime::now_utc(), Some(refresh_token));
        self.store.save_tokens(&tokens).await?;
        Ok(tokens)
    }
}
