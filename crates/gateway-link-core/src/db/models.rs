// Linked-account model — one row per (userId, providerId).
//
// The same table holds upstream OAuth provider accounts written by the
// identity provider and the `"gateway"` rows written by the synchronizer.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayApiError;

/// Provider id reserved for rows that hold gateway tokens.
pub const GATEWAY_PROVIDER_ID: &str = "gateway";

/// A user's linked account for one provider.
///
/// Field names serialize in camelCase to match the identity provider's
/// `account` table.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub id: String,
    /// Identity assigned by the provider (the gateway user id for gateway rows).
    pub account_id: String,
    /// Upstream provider id (e.g. "fortytwo") or [`GATEWAY_PROVIDER_ID`].
    pub provider_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkedAccount {
    /// Build a new gateway row for `user_id` from a freshly issued token set.
    pub fn new_gateway(
        id: String,
        user_id: impl Into<String>,
        gateway_user_id: impl Into<String>,
        tokens: &TokenSet,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id: gateway_user_id.into(),
            provider_id: GATEWAY_PROVIDER_ID.to_string(),
            user_id: user_id.into(),
            access_token: Some(tokens.access_token.clone()),
            refresh_token: Some(tokens.refresh_token.clone()),
            access_token_expires_at: Some(tokens.access_token_expires_at),
            refresh_token_expires_at: Some(tokens.refresh_token_expires_at),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the token columns and bump `updatedAt`. Identity columns are
    /// left untouched.
    pub fn apply_tokens(&mut self, tokens: &TokenSet, now: DateTime<Utc>) {
        self.access_token = Some(tokens.access_token.clone());
        self.refresh_token = Some(tokens.refresh_token.clone());
        self.access_token_expires_at = Some(tokens.access_token_expires_at);
        self.refresh_token_expires_at = Some(tokens.refresh_token_expires_at);
        self.updated_at = now;
    }

    /// `true` if the access token expires at or before `at + leeway`.
    /// Rows with no recorded expiry are treated as valid.
    pub fn access_token_expires_within(&self, at: DateTime<Utc>, leeway: Duration) -> bool {
        self.access_token_expires_at.map_or(false, |exp| {
            // A horizon past the representable range covers every expiry.
            at.checked_add_signed(leeway).map_or(true, |horizon| exp <= horizon)
        })
    }

    pub fn refresh_token_expired(&self, at: DateTime<Utc>) -> bool {
        self.refresh_token_expires_at.map_or(false, |exp| exp <= at)
    }
}

impl fmt::Debug for LinkedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedAccount")
            .field("id", &self.id)
            .field("account_id", &self.account_id)
            .field("provider_id", &self.provider_id)
            .field("user_id", &self.user_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Gateway tokens with absolute expiries.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Convert relative lifetimes (seconds) into absolute expiries.
    ///
    /// Both expiries are derived from the same `issued_at` instant. Negative
    /// lifetimes and expiries outside chrono's range are rejected.
    pub fn from_lifetimes(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
        refresh_token_expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, GatewayApiError> {
        Ok(Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            access_token_expires_at: expiry_after(issued_at, "expires_in", expires_in)?,
            refresh_token_expires_at: expiry_after(
                issued_at,
                "refresh_token_expires_in",
                refresh_token_expires_in,
            )?,
        })
    }
}

fn expiry_after(
    issued_at: DateTime<Utc>,
    field: &str,
    lifetime_secs: i64,
) -> Result<DateTime<Utc>, GatewayApiError> {
    if lifetime_secs < 0 {
        return Err(GatewayApiError::Decode(format!(
            "{field} is negative ({lifetime_secs})"
        )));
    }
    lifetime_secs
        .checked_mul(1000)
        .and_then(Duration::try_milliseconds)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .ok_or_else(|| GatewayApiError::Decode(format!("{field} is out of range ({lifetime_secs})")))
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .finish()
    }
}
