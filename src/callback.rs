use serde::Deserialize;
use url::Url;

/// Query parameters of the `/auth/callback` redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// What the provider sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Consent granted; exchange this code.
    Code(String),
    /// Consent refused or the provider reported an error.
    Denied {
        error: String,
        description: Option<String>,
    },
    MissingCode,
}

impl CallbackParams {
    /// Read the parameters from the full redirect URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match &*key {
                "code" => &mut params.code,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    /// Read the parameters from a raw query string (with or without the leading `?`).
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut url = Url::parse("http://callback.invalid/").expect("valid placeholder URL");
        url.set_query(Some(query.trim_start_matches('?')));
        Self::from_url(&url)
    }

    /// A provider error wins over a code; an empty code counts as missing.
    #[must_use]
    pub fn outcome(&self) -> CallbackOutcome {
        if let Some(error) = &self.error {
            return CallbackOutcome::Denied {
                error: error.clone(),
                description: self.error_description.clone(),
            };
        }
        match self.code.as_deref() {
            Some(code) if !code.is_empty() => CallbackOutcome::Code(code.to_owned()),
            _ => CallbackOutcome::MissingCode,
        }
    }
}
