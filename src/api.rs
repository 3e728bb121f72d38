//! Authenticated client for the Svennes Camping backend API.
//!
//! Every call resolves to an [`ApiResponse`]; callers branch on `success`, never on an
//! error type. A `401` from the API ends the session before the failure is returned.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::Error;
use crate::session::SessionManager;
use crate::store::TokenStore;
use crate::transactions::{NewTransaction, Transaction, TransactionPatch};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Uniform result of an API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub success: bool,
    /// Human-readable reason when `success` is false.
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            success: true,
            message: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            success: false,
            message: Some(message.into()),
        }
    }

    /// # Errors
    ///
    /// Returns the failure message when the call did not succeed.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(self
                .message
                .unwrap_or_else(|| "API call failed".to_string())),
        }
    }
}

/// Why an API call failed. Only used to build the user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum ApiFailure {
    #[error("Network error: Unable to reach the server. Please check your connection.")]
    NetworkUnreachable,
    #[error("{message}")]
    ServerError { status: u16, message: String },
    #[error("{0}")]
    Other(String),
}

impl ApiFailure {
    fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_builder() || e.is_decode() {
            Self::Other(e.to_string())
        } else {
            Self::NetworkUnreachable
        }
    }

    /// Prefer the API's own `message`, then `error`, then the status line.
    fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let parsed: Option<JsonValue> = serde_json::from_slice(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(JsonValue::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        let message = field("message").or_else(|| field("error")).unwrap_or_else(|| {
            format!(
                "Server error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )
            .trim_end()
            .to_string()
        });
        Self::ServerError {
            status: status.as_u16(),
            message,
        }
    }
}

/// Profile record from `GET /v1/user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    pub verified: bool,
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    NoAccess,
}

impl ApiUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins and regular users may use the app; `noaccess` accounts may not.
    #[must_use]
    pub fn has_access(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::User)
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub service: Option<String>,
}

/// One outbound call. Authenticated unless [`skip_auth`](Self::skip_auth) is set.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<JsonValue>,
    skip_auth: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            skip_auth: false,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiFailure::Other`] if the body does not serialize.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiFailure> {
        self.body = Some(serde_json::to_value(body).map_err(|e| ApiFailure::Other(e.to_string()))?);
        Ok(self)
    }

    /// Send without a bearer token (public endpoints).
    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }
}

/// HTTP client that injects the session's bearer token.
pub struct ApiClient<S> {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionManager<S>>,
}

impl<S: TokenStore> ApiClient<S> {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: Url, session: Arc<SessionManager<S>>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager<S>> {
        &self.session
    }

    pub async fn get_transactions(&self) -> ApiResponse<Vec<Transaction>> {
        self.call(ApiRequest::get("/v1/transactions")).await
    }

    pub async fn get_transaction(&self, id: &str) -> ApiResponse<Transaction> {
        self.call(ApiRequest::get(transaction_path(id))).await
    }

    pub async fn create_transaction(&self, transaction: &NewTransaction) -> ApiResponse<Transaction> {
        match ApiRequest::post("/v1/transactions").json(transaction) {
            Ok(request) => self.call(request).await,
            Err(failure) => ApiResponse::failure(failure.to_string()),
        }
    }

    pub async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> ApiResponse<Transaction> {
        match ApiRequest::put(transaction_path(id)).json(patch) {
            Ok(request) => self.call(request).await,
            Err(failure) => ApiResponse::failure(failure.to_string()),
        }
    }

    pub async fn delete_transaction(&self, id: &str) -> ApiResponse<()> {
        self.call(ApiRequest::delete(transaction_path(id))).await
    }

    pub async fn get_user(&self) -> ApiResponse<ApiUser> {
        self.call(ApiRequest::get("/v1/user")).await
    }

    /// Public liveness probe; sent without credentials.
    pub async fn health_check(&self) -> ApiResponse<HealthStatus> {
        self.call(ApiRequest::get("/health").skip_auth()).await
    }

    /// Send any request and fold the outcome into an [`ApiResponse`].
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResponse<T> {
        let (method, path) = (request.method.clone(), request.path.clone());
        match self.execute(request).await {
            Ok(data) => ApiResponse::ok(data),
            Err(failure) => {
                tracing::warn!(%method, %path, error = %failure, "API call failed");
                ApiResponse::failure(failure.to_string())
            }
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiFailure> {
        let url = self.url(&request.path)?;
        let mut builder = self.http.request(request.method, url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if !request.skip_auth {
            if let Some(token) = self.session.access_token().await {
                builder = builder.bearer_auth(token);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiFailure::from_transport(&e))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!("API rejected credentials, signing out");
            self.session.sign_out().await;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiFailure::from_transport(&e))?;
        if !status.is_success() {
            return Err(ApiFailure::from_status(status, &body));
        }
        decode_body(&body)
    }

    fn url(&self, path: &str) -> Result<Url, ApiFailure> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|e| ApiFailure::Other(e.to_string()))
    }
}

fn transaction_path(id: &str) -> String {
    format!("/v1/transactions/{}", urlencoding::encode(id))
}

// Empty bodies (204, bare DELETE) decode as JSON `null`, which `()` accepts.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiFailure> {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        JsonValue::Null
    } else {
        serde_json::from_slice(body).map_err(|e| ApiFailure::Other(e.to_string()))?
    };
    serde_json::from_value(value).map_err(|e| ApiFailure::Other(e.to_string()))
}
