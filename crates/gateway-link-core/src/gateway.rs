// Gateway API contract — wire types and the `GatewayApi` trait.
//
// The synchronizer and token provider only see this trait. The reqwest
// implementation lives in `gateway-link-client`; tests use a scripted mock.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::models::TokenSet;
use crate::error::GatewayApiError;

// ─── Endpoints ───────────────────────────────────────────────────

pub const LOGIN_PATH: &str = "/api/account/auths/login/";
pub const LOGOUT_PATH: &str = "/api/account/auths/logout/";
pub const REFRESH_PATH: &str = "/api/account/auths/refresh/";
pub const ME_PATH: &str = "/api/account/users/me/";

// ─── Wire Types ──────────────────────────────────────────────────

/// Body of `POST /api/account/auths/login/`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub provider: String,
    pub access_token: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("provider", &self.provider)
            .field("access_token", &"[redacted]")
            .finish()
    }
}

/// Body of `POST /api/account/auths/refresh/`.
#[derive(Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token grant returned by the login and refresh endpoints.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_token_expires_in: i64,
    /// Present on some gateway versions; identity is still confirmed via `whoAmI`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<GatewayUser>,
}

impl GatewayTokenResponse {
    /// Absolute expiries relative to `issued_at`. Fails with `Decode` when a
    /// lifetime is negative or too large to represent.
    pub fn to_token_set(&self, issued_at: DateTime<Utc>) -> Result<TokenSet, GatewayApiError> {
        TokenSet::from_lifetimes(
            self.access_token.clone(),
            self.refresh_token.clone(),
            self.expires_in,
            self.refresh_token_expires_in,
            issued_at,
        )
    }
}

impl fmt::Debug for GatewayTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayTokenResponse")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// A gateway user. Only `id` is interpreted; everything else is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GatewayUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Body of `GET /api/account/users/me/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: GatewayUser,
}

/// Gateway ids may arrive as JSON strings or integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

// ─── Trait ───────────────────────────────────────────────────────

/// Typed interface to the gateway's account API.
///
/// `login` and `refresh` are service-authenticated; `who_am_i` and `logout`
/// are authenticated with the user's own gateway access token.
#[async_trait]
pub trait GatewayApi: Send + Sync + fmt::Debug {
    /// Exchange an upstream provider access token for gateway tokens.
    async fn login(
        &self,
        provider: &str,
        upstream_access_token: &str,
    ) -> Result<GatewayTokenResponse, GatewayApiError>;

    /// Resolve the gateway user behind `access_token`.
    async fn who_am_i(&self, access_token: &str) -> Result<GatewayUser, GatewayApiError>;

    /// Revoke the gateway session behind `access_token`.
    async fn logout(&self, access_token: &str) -> Result<(), GatewayApiError>;

    /// Exchange a refresh token for a new token grant.
    async fn refresh(&self, refresh_token: &str) -> Result<GatewayTokenResponse, GatewayApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_user_id_accepts_number() {
        let me: MeResponse =
            serde_json::from_value(serde_json::json!({"user": {"id": 42, "username": "amy"}}))
                .unwrap();
        assert_eq!(me.user.id, "42");
        assert_eq!(me.user.extra["username"], "amy");
    }

    #[test]
    fn test_user_id_accepts_string() {
        let me: MeResponse =
            serde_json::from_value(serde_json::json!({"user": {"id": "g-123"}})).unwrap();
        assert_eq!(me.user.id, "g-123");
    }

    #[test]
    fn test_user_id_rejects_null() {
        let res: Result<MeResponse, _> =
            serde_json::from_value(serde_json::json!({"user": {"id": null}}));
        assert!(res.is_err());
    }

    #[test]
    fn test_token_response_without_user() {
        let resp: GatewayTokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "gw-a",
            "refresh_token": "gw-r",
            "expires_in": 3600,
            "refresh_token_expires_in": 86400
        }))
        .unwrap();
        assert!(resp.user.is_none());

        let t = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let set = resp.to_token_set(t).unwrap();
        assert_eq!(set.access_token, "gw-a");
        assert_eq!(
            set.access_token_expires_at.timestamp_millis(),
            t.timestamp_millis() + 3_600_000
        );
    }

    #[test]
    fn test_login_request_debug_redacts() {
        let req = LoginRequest {
            provider: "fortytwo".into(),
            access_token: "tok-up".into(),
        };
        let out = format!("{req:?}");
        assert!(out.contains("fortytwo"));
        assert!(!out.contains("tok-up"));
    }
}
