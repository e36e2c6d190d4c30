// Error taxonomy for the gateway token-linking protocol.
//
// Every failure on the synchronization, logout and token read paths is a
// `GatewayLinkError`. Each variant carries a stable `ErrorCode` and an HTTP
// status so the identity-provider integration layer can turn it into a
// response without matching on message strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable error codes surfaced to the integration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConfigurationError,
    UpstreamAccountNotFound,
    GatewayLoginFailed,
    GatewayIdentityFailed,
    GatewayLogoutFailed,
    GatewayRefreshFailed,
    GatewayAccountNotFound,
    AccountMismatch,
    StoreError,
    InternalServerError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::ConfigurationError => "Configuration error",
            Self::UpstreamAccountNotFound => "Upstream provider account not found",
            Self::GatewayLoginFailed => "Failed to log in to gateway",
            Self::GatewayIdentityFailed => "Failed to fetch user data from gateway",
            Self::GatewayLogoutFailed => "Failed to log out from gateway",
            Self::GatewayRefreshFailed => "Failed to refresh gateway token",
            Self::GatewayAccountNotFound => "Gateway account not found",
            Self::AccountMismatch => "Gateway account does not match linked account",
            Self::StoreError => "Account store error",
            Self::InternalServerError => "Internal server error",
        };
        write!(f, "{msg}")
    }
}

/// Failure returned by a [`GatewayApi`](crate::gateway::GatewayApi) call.
///
/// Kept transport-neutral: the HTTP client converts its own error type into
/// this one so the synchronizer never depends on reqwest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayApiError {
    /// The gateway answered with a non-success status.
    #[error("gateway returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (DNS, connect, TLS).
    #[error("gateway unreachable: {0}")]
    Network(String),

    /// The request exceeded its time budget.
    #[error("gateway request timed out")]
    Timeout,

    /// The response body did not match the expected shape.
    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

impl GatewayApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` for 401 responses, i.e. the bearer token was rejected.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Errors produced by the token-linking core.
#[derive(Debug, thiserror::Error)]
pub enum GatewayLinkError {
    /// A required secret or URL is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream provider account (or its access token) is not stored.
    #[error("no {provider_id} account with an access token for user {user_id}")]
    UpstreamAuth { user_id: String, provider_id: String },

    /// The gateway rejected the login exchange.
    #[error("Failed to log in to gateway: {0}")]
    GatewayLogin(#[source] GatewayApiError),

    /// `whoAmI` failed after a successful login; the session must be torn down.
    #[error("Failed to fetch user data from gateway: {0}")]
    GatewayIdentity(#[source] GatewayApiError),

    /// Gateway logout failed. Never blocks local sign-out.
    #[error("Failed to log out from gateway: {0}")]
    GatewayLogout(#[source] GatewayApiError),

    /// Refresh-token exchange failed or the refresh token has expired.
    #[error("Failed to refresh gateway token: {0}")]
    GatewayRefresh(String),

    /// No `(userId, "gateway")` row exists.
    #[error("no gateway account linked for user {user_id}")]
    GatewayAccountNotFound { user_id: String },

    /// The gateway reported a different identity than the one already linked.
    #[error("gateway reported account {reported} but user {user_id} is linked to {stored}")]
    AccountMismatch {
        user_id: String,
        stored: String,
        reported: String,
    },

    /// Datastore failure.
    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl GatewayLinkError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::ConfigurationError,
            Self::UpstreamAuth { .. } => ErrorCode::UpstreamAccountNotFound,
            Self::GatewayLogin(_) => ErrorCode::GatewayLoginFailed,
            Self::GatewayIdentity(_) => ErrorCode::GatewayIdentityFailed,
            Self::GatewayLogout(_) => ErrorCode::GatewayLogoutFailed,
            Self::GatewayRefresh(_) => ErrorCode::GatewayRefreshFailed,
            Self::GatewayAccountNotFound { .. } => ErrorCode::GatewayAccountNotFound,
            Self::AccountMismatch { .. } => ErrorCode::AccountMismatch,
            Self::Database(_) => ErrorCode::StoreError,
            Self::Anyhow(_) => ErrorCode::InternalServerError,
        }
    }

    /// HTTP status the integration layer should answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::GatewayLogin(_)
            | Self::GatewayIdentity(_)
            | Self::GatewayRefresh(_)
            | Self::AccountMismatch { .. } => 401,
            Self::UpstreamAuth { .. } | Self::GatewayAccountNotFound { .. } => 404,
            Self::GatewayLogout(_) => 502,
            Self::Config(_) | Self::Database(_) | Self::Anyhow(_) => 500,
        }
    }

    /// Whether the caller must drop the local session and sign in again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::GatewayIdentity(_) | Self::GatewayRefresh(_) | Self::AccountMismatch { .. }
        )
    }

    /// JSON body for an error response.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}

/// Unified result type for gateway-link operations.
pub type Result<T> = std::result::Result<T, GatewayLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let v = serde_json::to_value(ErrorCode::GatewayLoginFailed).unwrap();
        assert_eq!(v, "GATEWAY_LOGIN_FAILED");
    }

    #[test]
    fn test_identity_error_forces_reauth() {
        let err = GatewayLinkError::GatewayIdentity(GatewayApiError::Timeout);
        assert!(err.requires_reauthentication());
        assert_eq!(err.code(), ErrorCode::GatewayIdentityFailed);
        assert_eq!(err.status(), 401);
    }

    #[test]
    fn test_login_error_does_not_force_reauth() {
        let err = GatewayLinkError::GatewayLogin(GatewayApiError::Status {
            status: 400,
            message: "bad provider token".into(),
        });
        assert!(!err.requires_reauthentication());
        assert!(err.to_string().contains("bad provider token"));
    }

    #[test]
    fn test_to_json_shape() {
        let err = GatewayLinkError::GatewayAccountNotFound { user_id: "u1".into() };
        let json = err.to_json();
        assert_eq!(json["code"], "GATEWAY_ACCOUNT_NOT_FOUND");
        assert!(json["message"].as_str().unwrap().contains("u1"));
    }

    #[test]
    fn test_api_error_unauthorized() {
        let err = GatewayApiError::Status { status: 401, message: "expired".into() };
        assert!(err.is_unauthorized());
        assert!(!GatewayApiError::Timeout.is_unauthorized());
    }
}
