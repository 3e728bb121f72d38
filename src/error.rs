#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("OAuth configuration missing: {0}")]
    ConfigurationMissing(&'static str),
    #[error("Token exchange failed (status {status:?}): {detail}")]
    OAuthExchangeFailed { status: Option<u16>, detail: String },
    #[error("Identity fetch failed (status {status:?}): {detail}")]
    IdentityFetchFailed { status: Option<u16>, detail: String },
    #[error("Token refresh failed (status {status:?}): {detail}")]
    RefreshFailed { status: Option<u16>, detail: String },
    #[error("Session store error: {0}")]
    Store(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the provider rejected the request outright (4xx), as opposed to a transport
    /// failure or a provider outage.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        match self {
            Self::OAuthExchangeFailed { status, .. }
            | Self::IdentityFetchFailed { status, .. }
            | Self::RefreshFailed { status, .. } => {
                status.is_some_and(|s| (400..500).contains(&s))
            }
            _ => false,
        }
    }
}
