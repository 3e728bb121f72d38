use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::error::Error;
use crate::types::{TokenInfo, UserClaims};

/// Access-token lifetime assumed when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 3600;
/// Cap on a reported `expires_in`.
const MAX_EXPIRES_IN: u64 = 366 * 24 * 3600;

/// Google `OAuth2` configuration.
///
/// Client credentials may be empty (an unconfigured deployment); operations that need them
/// fail with [`Error::ConfigurationMissing`] instead of the constructor.
///
/// ```rust,ignore
/// use svennes_accounts::OAuthConfig;
///
/// let config = OAuthConfig::new("client-id", "client-secret", "https://camp.example/auth/callback".parse()?);
/// // Optional overrides via chaining:
/// let config = config.with_token_url("http://127.0.0.1:9000/token".parse()?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) userinfo_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl OAuthConfig {
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
            auth_url: Url::parse("https://accounts.google.com/o/oauth2/auth")
                .expect("valid default URL"),
            token_url: Url::parse("https://oauth2.googleapis.com/token")
                .expect("valid default URL"),
            userinfo_url: Url::parse("https://www.googleapis.com/oauth2/v2/userinfo")
                .expect("valid default URL"),
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
        }
    }

    /// Override the authorization endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// Override the userinfo endpoint.
    #[must_use]
    pub fn with_userinfo_url(mut self, url: Url) -> Self {
        self.userinfo_url = url;
        self
    }

    /// Override the requested scopes (default: `["openid", "email", "profile"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[must_use]
    pub fn userinfo_url(&self) -> &Url {
        &self.userinfo_url
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Token response from the Google token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Build the stored token record, keeping `previous_refresh` when the provider did not
    /// rotate the refresh token.
    #[must_use]
    pub fn into_token_info(
        self,
        now: OffsetDateTime,
        previous_refresh: Option<&str>,
    ) -> TokenInfo {
        let expires_in = self
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN)
            .min(MAX_EXPIRES_IN);
        let expires_in = i64::try_from(expires_in).unwrap_or_default();
        TokenInfo {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_owned)),
            expires_at: now + Duration::seconds(expires_in),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Exchange,
    Identity,
    Refresh,
}

impl Operation {
    fn error(self, status: Option<u16>, detail: String) -> Error {
        match self {
            Self::Exchange => Error::OAuthExchangeFailed { status, detail },
            Self::Identity => Error::IdentityFetchFailed { status, detail },
            Self::Refresh => Error::RefreshFailed { status, detail },
        }
    }
}

/// `OAuth2` client for the Google authorization-code flow.
pub struct OAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the consent-screen URL. Requests offline access so Google issues a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationMissing`] if no client id is configured.
    pub fn authorization_url(&self) -> Result<Url, Error> {
        if self.config.client_id.is_empty() {
            return Err(Error::ConfigurationMissing("Google client id"));
        }
        let scope = self.config.scopes.join(" ");

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &scope)
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline");

        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationMissing`] without client credentials, or
    /// [`Error::OAuthExchangeFailed`] on transport failure or a non-2xx response.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenInfo, Error> {
        let (client_id, client_secret) = self.credentials()?;
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .post_token_form(&params, Operation::Exchange)
            .await?;
        Ok(response.into_token_info(OffsetDateTime::now_utc(), None))
    }

    /// Fetch identity claims with an access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityFetchFailed`] on transport failure or a non-2xx response.
    pub async fn fetch_identity(&self, access_token: &str) -> Result<UserClaims, Error> {
        let op = Operation::Identity;
        let response = self
            .http
            .get(self.config.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| op.error(None, e.to_string()))?;

        let response = Self::ensure_success(response, op).await?;
        response
            .json::<UserClaims>()
            .await
            .map_err(|e| op.error(None, e.to_string()))
    }

    /// Redeem a refresh token. The returned response may or may not carry a new refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationMissing`] without client credentials, or
    /// [`Error::RefreshFailed`] on transport failure or a non-2xx response.
    pub async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, Error> {
        let (client_id, client_secret) = self.credentials()?;
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        self.post_token_form(&params, Operation::Refresh).await
    }

    fn credentials(&self) -> Result<(&str, &str), Error> {
        if self.config.client_id.is_empty() {
            return Err(Error::ConfigurationMissing("Google client id"));
        }
        if self.config.client_secret.is_empty() {
            return Err(Error::ConfigurationMissing("Google client secret"));
        }
        Ok((&self.config.client_id, &self.config.client_secret))
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        op: Operation,
    ) -> Result<TokenResponse, Error> {
        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(params)
            .send()
            .await
            .map_err(|e| op.error(None, e.to_string()))?;

        let response = Self::ensure_success(response, op).await?;
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| op.error(None, e.to_string()))
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        op: Operation,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(op.error(Some(status), body))
    }
}
