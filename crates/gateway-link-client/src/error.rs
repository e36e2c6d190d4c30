//! Client error types.
//!
//! Maps HTTP status codes to typed error variants. The gateway answers errors
//! in several shapes (`{"detail": ...}`, `{"code", "message"}`,
//! `{"error": {"code", "message"}}` or plain text); all of them are reduced
//! to a `code` and `message`.

use std::fmt;

use gateway_link_core::GatewayApiError;

/// Errors that can occur when calling the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network-level error (DNS, connection refused, TLS).
    Network(String),

    /// The request exceeded the configured timeout.
    Timeout,

    /// 400 Bad Request.
    BadRequest { code: String, message: String },

    /// 401 Unauthorized — the bearer token was missing, invalid or expired.
    Unauthorized { code: String, message: String },

    /// 403 Forbidden.
    Forbidden { code: String, message: String },

    /// 404 Not Found.
    NotFound { message: String },

    /// 409 Conflict.
    Conflict { code: String, message: String },

    /// 422 Unprocessable Entity.
    UnprocessableEntity { code: String, message: String },

    /// 429 Too Many Requests.
    TooManyRequests { message: String },

    /// 5xx, or any other unexpected status.
    Server { status: u16, message: String },

    /// Failed to deserialize the response body.
    Deserialization(String),
}

impl ClientError {
    /// Create a network or timeout error from a reqwest error.
    pub fn network(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Build the variant for a non-success status and its raw body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let (code, message) = parse_error_body(body);
        let code_or = |fallback: &str| code.clone().unwrap_or_else(|| fallback.to_string());
        match status {
            400 => Self::BadRequest { code: code_or("BAD_REQUEST"), message },
            401 => Self::Unauthorized { code: code_or("UNAUTHORIZED"), message },
            403 => Self::Forbidden { code: code_or("FORBIDDEN"), message },
            404 => Self::NotFound { message },
            409 => Self::Conflict { code: code_or("CONFLICT"), message },
            422 => Self::UnprocessableEntity { code: code_or("UNPROCESSABLE_ENTITY"), message },
            429 => Self::TooManyRequests { message },
            _ => Self::Server { status, message },
        }
    }

    /// Get the error code, if available.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::BadRequest { code, .. }
            | Self::Unauthorized { code, .. }
            | Self::Forbidden { code, .. }
            | Self::Conflict { code, .. }
            | Self::UnprocessableEntity { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Network(msg) | Self::Deserialization(msg) => msg,
            Self::Timeout => "request timed out",
            Self::BadRequest { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message }
            | Self::Conflict { message, .. }
            | Self::UnprocessableEntity { message, .. }
            | Self::TooManyRequests { message }
            | Self::Server { message, .. } => message,
        }
    }

    /// Get the HTTP status code, if applicable.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest { .. } => Some(400),
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::UnprocessableEntity { .. } => Some(422),
            Self::TooManyRequests { .. } => Some(429),
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::BadRequest { code, message } => write!(f, "Bad Request [{code}]: {message}"),
            Self::Unauthorized { code, message } => write!(f, "Unauthorized [{code}]: {message}"),
            Self::Forbidden { code, message } => write!(f, "Forbidden [{code}]: {message}"),
            Self::NotFound { message } => write!(f, "Not Found: {message}"),
            Self::Conflict { code, message } => write!(f, "Conflict [{code}]: {message}"),
            Self::UnprocessableEntity { code, message } => {
                write!(f, "Unprocessable Entity [{code}]: {message}")
            }
            Self::TooManyRequests { message } => write!(f, "Too Many Requests: {message}"),
            Self::Server { status, message } => write!(f, "Server Error ({status}): {message}"),
            Self::Deserialization(msg) => write!(f, "Deserialization error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ClientError> for GatewayApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(msg) => GatewayApiError::Network(msg),
            ClientError::Timeout => GatewayApiError::Timeout,
            ClientError::Deserialization(msg) => GatewayApiError::Decode(msg),
            other => GatewayApiError::Status {
                status: other.status().unwrap_or(500),
                message: other.message().to_string(),
            },
        }
    }
}

const MAX_MESSAGE_LEN: usize = 200;

/// Extract `(code, message)` from an error body.
fn parse_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let scope = value.get("error").filter(|e| e.is_object()).unwrap_or(&value);
        let code = scope.get("code").and_then(|c| c.as_str()).map(String::from);
        let message = scope
            .get("message")
            .or_else(|| value.get("detail"))
            .map(|m| match m {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        if let Some(message) = message {
            return (code, truncate(&message));
        }
        if let serde_json::Value::String(s) = &value {
            return (None, truncate(s));
        }
    }
    if trimmed.is_empty() {
        (None, "Unknown error".to_string())
    } else {
        (None, truncate(trimmed))
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_MESSAGE_LEN {
        let cut: String = s.chars().take(MAX_MESSAGE_LEN).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}
