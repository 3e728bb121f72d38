use url::Url;

use crate::error::Error;
use crate::oauth::OAuthConfig;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";

/// Route the provider redirects back to after consent.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Application configuration: the Google client and the backend API location.
///
/// Use [`from_env()`](AppConfig::from_env) for convention-based setup,
/// or [`new()`](AppConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub(crate) oauth: OAuthConfig,
    pub(crate) api_base_url: Url,
}

impl AppConfig {
    #[must_use]
    pub fn new(oauth: OAuthConfig, api_base_url: Url) -> Self {
        Self {
            oauth,
            api_base_url,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Env vars
    /// - `API_BASE_URL`: backend API base (default `http://localhost:3000`)
    /// - `APP_ORIGIN`: origin the app is served from; the redirect URI is
    ///   `<APP_ORIGIN>/auth/callback` (default `http://localhost:5173`)
    /// - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`: OAuth client credentials. Empty when
    ///   unset; sign-in and token operations then fail with `ConfigurationMissing`.
    /// - `GOOGLE_AUTH_URL`, `GOOGLE_TOKEN_URL`, `GOOGLE_USERINFO_URL`: endpoint overrides
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a URL is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env()`](AppConfig::from_env) with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a URL is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let api_base_url = parse_url(
            "API_BASE_URL",
            &lookup("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.into()),
        )?;
        let origin = lookup("APP_ORIGIN").unwrap_or_else(|| DEFAULT_APP_ORIGIN.into());
        let redirect_uri = parse_url(
            "APP_ORIGIN",
            &format!("{}{CALLBACK_PATH}", origin.trim_end_matches('/')),
        )?;

        let client_id = lookup("GOOGLE_CLIENT_ID").unwrap_or_default();
        let client_secret = lookup("GOOGLE_CLIENT_SECRET").unwrap_or_default();
        if client_id.is_empty() {
            tracing::warn!("GOOGLE_CLIENT_ID is not set; sign-in will be unavailable");
        }

        let mut oauth = OAuthConfig::new(client_id, client_secret, redirect_uri);

        if let Some(url_str) = lookup("GOOGLE_AUTH_URL") {
            oauth = oauth.with_auth_url(parse_url("GOOGLE_AUTH_URL", &url_str)?);
        }
        if let Some(url_str) = lookup("GOOGLE_TOKEN_URL") {
            oauth = oauth.with_token_url(parse_url("GOOGLE_TOKEN_URL", &url_str)?);
        }
        if let Some(url_str) = lookup("GOOGLE_USERINFO_URL") {
            oauth = oauth.with_userinfo_url(parse_url("GOOGLE_USERINFO_URL", &url_str)?);
        }

        Ok(Self::new(oauth, api_base_url))
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: Url) -> Self {
        self.api_base_url = url;
        self
    }

    #[must_use]
    pub fn with_oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = oauth;
        self
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthConfig {
        &self.oauth
    }

    #[must_use]
    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }
}

fn parse_url(var: &str, value: &str) -> Result<Url, Error> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("{var}: {e}")))
}
