use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Google account identifier (the userinfo `id` claim).
///
/// Stable per Google account. Returned by the provider, never generated locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Whether protected views may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    /// Startup check has not finished yet.
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Signed-in user as shown in the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Identity claims from the Google userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserClaims {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub verified_email: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl From<UserClaims> for User {
    fn from(claims: UserClaims) -> Self {
        Self {
            id: claims.id,
            name: claims.name,
            email: claims.email,
            image: claims.picture,
        }
    }
}

/// Access/refresh token pair as persisted under `auth_tokens`.
///
/// Never mutated in place: every refresh produces a new value that replaces the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, persisted as Unix milliseconds.
    #[serde(with = "unix_millis")]
    pub expires_at: OffsetDateTime,
    pub token_type: String,
}

impl TokenInfo {
    /// True while the access token stays valid for longer than `buffer` past `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: OffsetDateTime, buffer: Duration) -> bool {
        self.expires_at > now + buffer
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Session shell as persisted under `auth_session`: the user and the session deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: User,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

/// Everything the token store holds. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    pub session: Option<StoredSession>,
    pub tokens: Option<TokenInfo>,
}

/// An authenticated session: who is signed in, with which tokens, until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub tokens: TokenInfo,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

impl Session {
    #[must_use]
    pub fn from_parts(shell: StoredSession, tokens: TokenInfo) -> Self {
        Self {
            user: shell.user,
            tokens,
            expires: shell.expires,
        }
    }

    /// The persisted part of this session, without tokens.
    #[must_use]
    pub fn shell(&self) -> StoredSession {
        StoredSession {
            user: self.user.clone(),
            expires: self.expires,
        }
    }

    /// Valid only while both the session deadline and the access token are in the future.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.expires > now && !self.tokens.is_expired_at(now)
    }
}

mod unix_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub(super) fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let millis = i64::try_from(value.unix_timestamp_nanos() / 1_000_000)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_i64(millis)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map_err(serde::de::Error::custom)
    }
}
