// Environment detection, configuration loading and logger setup.
//
// Configuration is read through a lookup function so tests can supply a map
// instead of mutating process environment. Missing required values fail fast
// with `GatewayLinkError::Config` naming the variable.

use std::fmt;
use std::sync::OnceLock;

use crate::error::{GatewayLinkError, Result};

/// Cached environment mode.
static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

/// Detect the current environment mode from `GATEWAY_LINK_ENV`, then `RUST_ENV`.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let env_val = std::env::var("GATEWAY_LINK_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        parse_env_mode(&env_val)
    })
}

fn parse_env_mode(value: &str) -> EnvMode {
    match value.to_lowercase().as_str() {
        "production" | "prod" => EnvMode::Production,
        "test" | "testing" => EnvMode::Test,
        _ => EnvMode::Development,
    }
}

pub fn is_production() -> bool {
    detect_env_mode() == EnvMode::Production
}

/// Initialize the `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise info in production, debug elsewhere.
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production() {
            EnvFilter::new("gateway_link=info")
        } else {
            EnvFilter::new("gateway_link=debug")
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}

// ─── Gateway Config ──────────────────────────────────────────────

pub const SERVICE_TOKEN_VAR: &str = "SERVICE_TOKEN";
pub const GATEWAY_URL_VAR: &str = "GATEWAY_URL";
pub const PUBLIC_GATEWAY_URL_VAR: &str = "PUBLIC_GATEWAY_URL";
pub const GATEWAY_TIMEOUT_VAR: &str = "GATEWAY_TIMEOUT_SECS";

/// Where an outbound gateway call originates. Selects the base URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Server-side call over the internal network.
    #[default]
    Server,
    /// Call made on behalf of a browser, through the public URL.
    Browser,
}

/// Gateway connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Static token authenticating this service to the gateway.
    pub service_token: String,
    /// Base URL used for server-side calls.
    pub server_url: String,
    /// Base URL used for browser-originated calls.
    pub public_url: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("service_token", &"[redacted]")
            .field("server_url", &self.server_url)
            .field("public_url", &self.public_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_token = required(&lookup, SERVICE_TOKEN_VAR)?;
        let server_url = validate_url(GATEWAY_URL_VAR, &required(&lookup, GATEWAY_URL_VAR)?)?;
        let public_url = match non_empty(&lookup, PUBLIC_GATEWAY_URL_VAR) {
            Some(url) => validate_url(PUBLIC_GATEWAY_URL_VAR, &url)?,
            None => server_url.clone(),
        };
        let timeout_secs = match non_empty(&lookup, GATEWAY_TIMEOUT_VAR) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                GatewayLinkError::Config(format!(
                    "{GATEWAY_TIMEOUT_VAR} must be a whole number of seconds, got \"{raw}\""
                ))
            })?,
            None => 30,
        };

        Ok(Self {
            service_token,
            server_url,
            public_url,
            timeout_secs,
        })
    }

    pub fn base_url(&self, context: ExecutionContext) -> &str {
        match context {
            ExecutionContext::Server => &self.server_url,
            ExecutionContext::Browser => &self.public_url,
        }
    }
}

// ─── Upstream Provider Config ────────────────────────────────────

/// OAuth client settings for one upstream provider.
///
/// The OAuth flow itself runs inside the identity provider; these values
/// are loaded here so a misconfigured provider fails at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamProviderConfig {
    pub provider_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub user_info_url: Option<String>,
    pub scopes: Vec<String>,
}

impl fmt::Debug for UpstreamProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .field("user_info_url", &self.user_info_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl UpstreamProviderConfig {
    pub fn from_env(provider_id: &str) -> Result<Self> {
        Self::from_lookup(provider_id, |key| std::env::var(key).ok())
    }

    /// Reads `<PROVIDER>_CLIENT_ID` / `<PROVIDER>_CLIENT_SECRET`, plus optional
    /// `<PROVIDER>_AUTHORIZATION_URL`, `_TOKEN_URL`, `_USER_INFO_URL`, `_SCOPES`
    /// which override the built-in endpoints of known providers.
    pub fn from_lookup<F>(provider_id: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = env_prefix(provider_id);
        let client_id = required(&lookup, &format!("{prefix}_CLIENT_ID"))?;
        let client_secret = required(&lookup, &format!("{prefix}_CLIENT_SECRET"))?;

        let mut config = Self::well_known(provider_id, client_id, client_secret);
        if let Some(url) = non_empty(&lookup, &format!("{prefix}_AUTHORIZATION_URL")) {
            config.authorization_url = Some(url);
        }
        if let Some(url) = non_empty(&lookup, &format!("{prefix}_TOKEN_URL")) {
            config.token_url = Some(url);
        }
        if let Some(url) = non_empty(&lookup, &format!("{prefix}_USER_INFO_URL")) {
            config.user_info_url = Some(url);
        }
        if let Some(scopes) = non_empty(&lookup, &format!("{prefix}_SCOPES")) {
            config.scopes = scopes
                .split([',', ' '])
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(config)
    }

    fn well_known(provider_id: &str, client_id: String, client_secret: String) -> Self {
        let (authorization_url, token_url, user_info_url, scopes): (_, _, _, &[&str]) =
            match provider_id {
                "fortytwo" => (
                    Some("https://api.intra.42.fr/oauth/authorize"),
                    Some("https://api.intra.42.fr/oauth/token"),
                    Some("https://api.intra.42.fr/v2/me"),
                    &["public"],
                ),
                "google" => (
                    Some("https://accounts.google.com/o/oauth2/v2/auth"),
                    Some("https://oauth2.googleapis.com/token"),
                    Some("https://openidconnect.googleapis.com/v1/userinfo"),
                    &["openid", "email", "profile"],
                ),
                _ => (None, None, None, &[]),
            };
        Self {
            provider_id: provider_id.to_string(),
            client_id,
            client_secret,
            authorization_url: authorization_url.map(String::from),
            token_url: token_url.map(String::from),
            user_info_url: user_info_url.map(String::from),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn env_prefix(provider_id: &str) -> String {
    provider_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .ok_or_else(|| GatewayLinkError::Config(format!("{key} is not set")))
}

fn validate_url(key: &str, url: &str) -> Result<String> {
    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .map(|rest| rest.split(['/', '?', '#']).next().unwrap_or_default());
    match host {
        Some(host) if !host.is_empty() && !host.starts_with(':') => {
            Ok(url.trim_end_matches('/').to_string())
        }
        Some(_) => Err(GatewayLinkError::Config(format!(
            "{key} has no host, got \"{url}\""
        ))),
        None => Err(GatewayLinkError::Config(format!(
            "{key} must be an http(s) URL, got \"{url}\""
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_env_mode() {
        assert_eq!(parse_env_mode("production"), EnvMode::Production);
        assert_eq!(parse_env_mode("PROD"), EnvMode::Production);
        assert_eq!(parse_env_mode("test"), EnvMode::Test);
        assert_eq!(parse_env_mode(""), EnvMode::Development);
    }

    #[test]
    fn test_gateway_config_minimal() {
        let cfg = GatewayConfig::from_lookup(lookup(&[
            ("SERVICE_TOKEN", "svc"),
            ("GATEWAY_URL", "http://gateway:8000/"),
        ]))
        .unwrap();
        assert_eq!(cfg.server_url, "http://gateway:8000");
        assert_eq!(cfg.public_url, "http://gateway:8000");
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn test_gateway_config_public_url_for_browser() {
        let cfg = GatewayConfig::from_lookup(lookup(&[
            ("SERVICE_TOKEN", "svc"),
            ("GATEWAY_URL", "http://gateway:8000"),
            ("PUBLIC_GATEWAY_URL", "https://api.example.com"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url(ExecutionContext::Server), "http://gateway:8000");
        assert_eq!(cfg.base_url(ExecutionContext::Browser), "https://api.example.com");
    }

    #[test]
    fn test_missing_service_token_names_variable() {
        let err = GatewayConfig::from_lookup(lookup(&[("GATEWAY_URL", "http://g")])).unwrap_err();
        assert!(matches!(err, GatewayLinkError::Config(ref m) if m.contains("SERVICE_TOKEN")));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = GatewayConfig::from_lookup(lookup(&[
            ("SERVICE_TOKEN", "   "),
            ("GATEWAY_URL", "http://g"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SERVICE_TOKEN"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = GatewayConfig::from_lookup(lookup(&[
            ("SERVICE_TOKEN", "svc"),
            ("GATEWAY_URL", "gateway:8000"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GATEWAY_URL"));
    }

    #[test]
    fn test_url_without_host_rejected() {
        for url in ["http://", "https:///api", "http://:8000", "https://?x=1"] {
            let err = GatewayConfig::from_lookup(lookup(&[
                ("SERVICE_TOKEN", "svc"),
                ("GATEWAY_URL", url),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains("no host"), "{url}: {err}");
        }

        let err = GatewayConfig::from_lookup(lookup(&[
            ("SERVICE_TOKEN", "svc"),
            ("GATEWAY_URL", "http://gateway:8000"),
            ("PUBLIC_GATEWAY_URL", "https://"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PUBLIC_GATEWAY_URL"));

        let cfg = GatewayConfig::from_lookup(lookup(&[
            ("SERVICE_TOKEN", "svc"),
            ("GATEWAY_URL", "http://gateway:8000/"),
        ]))
        .unwrap();
        assert_eq!(cfg.server_url, "http://gateway:8000");
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let err = GatewayConfig::from_lookup(lookup(&[
            ("SERVICE_TOKEN", "svc"),
            ("GATEWAY_URL", "http://g"),
            ("GATEWAY_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GATEWAY_TIMEOUT_SECS"));
    }

    #[test]
    fn test_debug_redacts_service_token() {
        let cfg = GatewayConfig::from_lookup(lookup(&[
            ("SERVICE_TOKEN", "super-secret"),
            ("GATEWAY_URL", "http://g"),
        ]))
        .unwrap();
        assert!(!format!("{cfg:?}").contains("super-secret"));
    }

    #[test]
    fn test_fortytwo_provider_defaults() {
        let cfg = UpstreamProviderConfig::from_lookup(
            "fortytwo",
            lookup(&[("FORTYTWO_CLIENT_ID", "cid"), ("FORTYTWO_CLIENT_SECRET", "cs")]),
        )
        .unwrap();
        assert_eq!(cfg.token_url.as_deref(), Some("https://api.intra.42.fr/oauth/token"));
        assert_eq!(cfg.scopes, vec!["public"]);
    }

    #[test]
    fn test_provider_overrides_and_missing_secret() {
        let cfg = UpstreamProviderConfig::from_lookup(
            "my-idp",
            lookup(&[
                ("MY_IDP_CLIENT_ID", "cid"),
                ("MY_IDP_CLIENT_SECRET", "cs"),
                ("MY_IDP_TOKEN_URL", "https://idp/token"),
                ("MY_IDP_SCOPES", "a, b"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.token_url.as_deref(), Some("https://idp/token"));
        assert_eq!(cfg.scopes, vec!["a", "b"]);

        let err = UpstreamProviderConfig::from_lookup("google", lookup(&[("GOOGLE_CLIENT_ID", "x")]))
            .unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLIENT_SECRET"));
    }
}
