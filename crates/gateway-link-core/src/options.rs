// GatewayLinkOptions — behavioural knobs for the linking core.
//
// Deserializable (camelCase) so hosts can keep them next to the rest of
// their auth configuration.

use serde::{Deserialize, Serialize};

use crate::db::models::GATEWAY_PROVIDER_ID;

/// What to do when the gateway reports a different user id than the one
/// already stored on the user's gateway row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountIdPolicy {
    /// Keep the stored row authoritative and overwrite its tokens (logged at warn).
    #[default]
    KeepExisting,
    /// Fail synchronization without writing.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayLinkOptions {
    /// Route patterns of the OAuth callback endpoint (post sign-in).
    #[serde(default = "default_callback_paths")]
    pub callback_paths: Vec<String>,

    /// Route patterns of the sign-out endpoint.
    #[serde(default = "default_sign_out_paths")]
    pub sign_out_paths: Vec<String>,

    /// Route parameter holding the upstream provider id on callback routes.
    #[serde(default = "default_provider_param")]
    pub provider_param: String,

    /// Where to send the user when their gateway identity cannot be confirmed.
    #[serde(default = "default_logout_redirect")]
    pub logout_redirect: String,

    /// Provider id under which gateway tokens are stored.
    #[serde(default = "default_gateway_provider_id")]
    pub gateway_provider_id: String,

    #[serde(default)]
    pub account_id_policy: AccountIdPolicy,

    /// Seconds before access-token expiry at which `fresh_token` refreshes.
    #[serde(default = "default_refresh_leeway_secs")]
    pub refresh_leeway_secs: i64,
}

fn default_callback_paths() -> Vec<String> {
    vec!["/callback/:id".to_string()]
}

fn default_sign_out_paths() -> Vec<String> {
    vec!["/sign-out".to_string()]
}

fn default_provider_param() -> String {
    "id".to_string()
}

fn default_logout_redirect() -> String {
    "/auth/logout".to_string()
}

fn default_gateway_provider_id() -> String {
    GATEWAY_PROVIDER_ID.to_string()
}

fn default_refresh_leeway_secs() -> i64 {
    60
}

impl Default for GatewayLinkOptions {
    fn default() -> Self {
        Self {
            callback_paths: default_callback_paths(),
            sign_out_paths: default_sign_out_paths(),
            provider_param: default_provider_param(),
            logout_redirect: default_logout_redirect(),
            gateway_provider_id: default_gateway_provider_id(),
            account_id_policy: AccountIdPolicy::default(),
            refresh_leeway_secs: default_refresh_leeway_secs(),
        }
    }
}

impl GatewayLinkOptions {
    pub fn with_account_id_policy(mut self, policy: AccountIdPolicy) -> Self {
        self.account_id_policy = policy;
        self
    }

    pub fn with_logout_redirect(mut self, location: impl Into<String>) -> Self {
        self.logout_redirect = location.into();
        self
    }

    /// Negative values mean no leeway; values beyond chrono's range saturate.
    pub fn refresh_leeway(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.refresh_leeway_secs.max(0))
            .unwrap_or(chrono::Duration::MAX)
    }
}
