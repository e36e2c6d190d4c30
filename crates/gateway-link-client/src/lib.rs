//! # Gateway API client
//!
//! reqwest-based client for the gateway's account API, plus [`HttpGateway`],
//! the [`GatewayApi`] implementation used by the synchronizer.
//!
//! Two authentication modes exist:
//!
//! - **service-level**: authenticated with the static `SERVICE_TOKEN`; used
//!   for `login` and `refresh`.
//! - **user-level**: authenticated with one user's gateway access token;
//!   used for `me` and `logout`.
//!
//! ```rust,no_run
//! use gateway_link_client::GatewayClient;
//! use gateway_link_core::{ExecutionContext, GatewayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let me = GatewayClient::user(&config, "gw-access", ExecutionContext::Server)
//!     .me()
//!     .await?;
//! println!("gateway user {}", me.user.id);
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::ClientError;

use async_trait::async_trait;

use gateway_link_core::gateway::{
    LoginRequest, MeResponse, RefreshRequest, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REFRESH_PATH,
};
use gateway_link_core::{
    ExecutionContext, GatewayApi, GatewayApiError, GatewayConfig, GatewayTokenResponse, GatewayUser,
};

// ─── Client Options ────────────────────────────────────────────────

#[derive(Clone)]
pub struct ClientOptions {
    /// Gateway base URL (e.g. `http://gateway:8000`).
    pub base_url: String,

    /// Sent as `Authorization: Bearer <token>` on every request.
    pub bearer_token: Option<String>,

    /// HTTP request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            bearer_token: None,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[redacted]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ─── Client ────────────────────────────────────────────────────────

/// Async HTTP client for one gateway base URL and one credential.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.bearer_token.is_some())
            .finish()
    }
}

impl GatewayClient {
    pub fn new(options: ClientOptions) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(options.timeout_secs))
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            bearer_token: options.bearer_token,
        }
    }

    /// Service-level client: server URL, `SERVICE_TOKEN` bearer.
    pub fn service(config: &GatewayConfig) -> Self {
        Self::new(ClientOptions {
            base_url: config.base_url(ExecutionContext::Server).to_string(),
            bearer_token: Some(config.service_token.clone()),
            timeout_secs: config.timeout_secs,
        })
    }

    /// User-level client: base URL chosen by `context`, the user's gateway
    /// access token as bearer.
    pub fn user(config: &GatewayConfig, access_token: &str, context: ExecutionContext) -> Self {
        Self::new(ClientOptions {
            base_url: config.base_url(context).to_string(),
            bearer_token: Some(access_token.to_string()),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Same connection pool and base URL, different bearer.
    pub fn with_bearer(&self, token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            bearer_token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ─── Endpoints ─────────────────────────────────────────────────

    /// `POST /api/account/auths/login/`
    pub async fn login(
        &self,
        provider: &str,
        upstream_access_token: &str,
    ) -> Result<GatewayTokenResponse, ClientError> {
        self.post(
            LOGIN_PATH,
            &LoginRequest {
                provider: provider.to_string(),
                access_token: upstream_access_token.to_string(),
            },
        )
        .await
    }

    /// `POST /api/account/auths/refresh/`
    pub async fn refresh(&self, refresh_token: &str) -> Result<GatewayTokenResponse, ClientError> {
        self.post(
            REFRESH_PATH,
            &RefreshRequest {
                refresh_token: refresh_token.to_string(),
            },
        )
        .await
    }

    /// `GET /api/account/users/me/`
    pub async fn me(&self) -> Result<MeResponse, ClientError> {
        self.get(ME_PATH).await
    }

    /// `POST /api/account/auths/logout/`. Any success status counts; the
    /// body is ignored.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let resp = self
            .request(reqwest::Method::POST, LOGOUT_PATH)
            .send()
            .await
            .map_err(ClientError::network)?;
        Self::check_status(resp).await.map(|_| ())
    }

    // ─── Internal HTTP Helpers ─────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(ClientError::network)?;
        Self::handle_response(resp).await
    }

    async fn post<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(ClientError::network)?;
        Self::handle_response(resp).await
    }

    /// Return the response if its status is a success, else the mapped error.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ClientError::from_status(status.as_u16(), &body))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await.map_err(ClientError::network)?;
        serde_json::from_str(&body).map_err(|e| {
            let snippet: String = body.chars().take(200).collect();
            ClientError::Deserialization(format!(
                "Failed to deserialize response: {e} (body: {snippet})"
            ))
        })
    }
}

// ─── GatewayApi ────────────────────────────────────────────────────

/// [`GatewayApi`] over HTTP.
///
/// `login`/`refresh` go through the service client. `who_am_i`/`logout` reuse
/// its connection pool with the caller's token as bearer, against the base URL
/// of the configured execution context.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    service: GatewayClient,
    user_base: GatewayClient,
}

impl HttpGateway {
    /// Server-side gateway access.
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_context(config, ExecutionContext::Server)
    }

    pub fn with_context(config: &GatewayConfig, context: ExecutionContext) -> Self {
        let service = GatewayClient::service(config);
        let user_base = GatewayClient {
            http: service.http.clone(),
            base_url: config.base_url(context).trim_end_matches('/').to_string(),
            bearer_token: None,
        };
        Self { service, user_base }
    }

    pub fn service_client(&self) -> &GatewayClient {
        &self.service
    }

    /// User-level client for `access_token`.
    pub fn user_client(&self, access_token: &str) -> GatewayClient {
        self.user_base.with_bearer(access_token)
    }
}

#[async_trait]
impl GatewayApi for HttpGateway {
    async fn login(
        &self,
        provider: &str,
        upstream_access_token: &str,
    ) -> Result<GatewayTokenResponse, GatewayApiError> {
        tracing::debug!(provider, "gateway login");
        Ok(self.service.login(provider, upstream_access_token).await?)
    }

    async fn who_am_i(&self, access_token: &str) -> Result<GatewayUser, GatewayApiError> {
        Ok(self.user_client(access_token).me().await?.user)
    }

    async fn logout(&self, access_token: &str) -> Result<(), GatewayApiError> {
        Ok(self.user_client(access_token).logout().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<GatewayTokenResponse, GatewayApiError> {
        tracing::debug!("gateway token refresh");
        Ok(self.service.refresh(refresh_token).await?)
    }
}
