// TokenLinkSynchronizer — exchanges upstream credentials for gateway tokens.
//
// Steps run strictly in order and stop at the first failure:
//   1. read the upstream account row and its access token
//   2. gateway login with that token
//   3. whoAmI with the fresh gateway access token
//   4. atomic upsert of the (userId, "gateway") row
// Nothing is written unless every call before the upsert succeeded.

use std::sync::Arc;

use gateway_link_core::utils::generate_id;
use gateway_link_core::{AccountIdPolicy, GatewayLinkError, LinkedAccount, Result, Upserted};

use crate::context::LinkContext;

#[derive(Debug, Clone)]
pub struct TokenLinkSynchronizer {
    ctx: Arc<LinkContext>,
}

impl TokenLinkSynchronizer {
    pub fn new(ctx: Arc<LinkContext>) -> Self {
        Self { ctx }
    }

    /// Link `user_id` to the gateway using their `provider_id` account.
    ///
    /// Returns the stored gateway row. Calling it again re-runs the login and
    /// overwrites the row's tokens; it never creates a second row.
    pub async fn synchronize(&self, user_id: &str, provider_id: &str) -> Result<LinkedAccount> {
        let gateway_provider_id = self.ctx.gateway_provider_id();
        tracing::debug!(user_id, provider_id, "synchronizing gateway link");

        if provider_id == gateway_provider_id {
            return Err(upstream_missing(user_id, provider_id));
        }

        let upstream_token = self
            .ctx
            .store
            .find_account(user_id, provider_id)
            .await?
            .and_then(|account| account.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| upstream_missing(user_id, provider_id))?;

        let grant = self
            .ctx
            .gateway
            .login(provider_id, &upstream_token)
            .await
            .map_err(|e| {
                tracing::error!(user_id, provider_id, error = %e, "gateway login failed");
                GatewayLinkError::GatewayLogin(e)
            })?;

        // One instant for both expiries and the audit columns.
        let issued_at = self.ctx.clock.now();
        let tokens = grant.to_token_set(issued_at).map_err(|e| {
            tracing::error!(user_id, provider_id, error = %e, "gateway login returned unusable lifetimes");
            GatewayLinkError::GatewayLogin(e)
        })?;

        let gateway_user = self
            .ctx
            .gateway
            .who_am_i(&tokens.access_token)
            .await
            .map_err(|e| {
                tracing::error!(user_id, provider_id, error = %e, "gateway identity lookup failed");
                GatewayLinkError::GatewayIdentity(e)
            })?;

        if self.ctx.options.account_id_policy == AccountIdPolicy::Reject {
            if let Some(existing) = self.ctx.store.find_account(user_id, gateway_provider_id).await? {
                if existing.account_id != gateway_user.id {
                    return Err(mismatch(user_id, existing.account_id, gateway_user.id));
                }
            }
        }

        let mut candidate =
            LinkedAccount::new_gateway(generate_id(), user_id, &gateway_user.id, &tokens, issued_at);
        candidate.provider_id = gateway_provider_id.to_string();

        let linked = match self.ctx.store.upsert_account(candidate).await? {
            Upserted::Created(account) => {
                tracing::info!(user_id, provider_id, gateway_user_id = %account.account_id, "gateway link created");
                account
            }
            Upserted::Updated(account) => {
                tracing::info!(user_id, provider_id, gateway_user_id = %account.account_id, "gateway link updated");
                account
            }
        };

        if linked.account_id != gateway_user.id {
            match self.ctx.options.account_id_policy {
                AccountIdPolicy::KeepExisting => tracing::warn!(
                    user_id,
                    stored = %linked.account_id,
                    reported = %gateway_user.id,
                    "gateway reported a different account id; keeping the stored one"
                ),
                // A concurrent sign-in linked another identity after our check.
                AccountIdPolicy::Reject => {
                    return Err(mismatch(user_id, linked.account_id, gateway_user.id))
                }
            }
        }

        Ok(linked)
    }
}

fn upstream_missing(user_id: &str, provider_id: &str) -> GatewayLinkError {
    tracing::error!(user_id, provider_id, "no upstream access token to exchange");
    GatewayLinkError::UpstreamAuth {
        user_id: user_id.to_string(),
        provider_id: provider_id.to_string(),
    }
}

fn mismatch(user_id: &str, stored: String, reported: String) -> GatewayLinkError {
    tracing::error!(user_id, %stored, %reported, "gateway account id mismatch");
    GatewayLinkError::AccountMismatch {
        user_id: user_id.to_string(),
        stored,
        reported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gateway_link_core::{AccountStore, ErrorCode, GatewayApiError, GatewayUser, GATEWAY_PROVIDER_ID};
    use gateway_link_memory::MemoryAccountStore;
    use gateway_link_test_utils::MockGateway;

    use crate::test_support::{context, t0, upstream_account};

    async fn setup(gateway: MockGateway) -> (TokenLinkSynchronizer, MemoryAccountStore, Arc<MockGateway>) {
        let store = MemoryAccountStore::with_accounts(vec![upstream_account("u1", "fortytwo", "tok-up")]);
        let gateway = Arc::new(gateway);
        let ctx = context(store.clone(), gateway.clone(), Default::default());
        (TokenLinkSynchronizer::new(ctx), store, gateway)
    }

    #[tokio::test]
    async fn test_links_user_on_first_sign_in() {
        let gateway = MockGateway::new("g-123");
        gateway.push_login(Ok(MockGateway::grant("gw-a", "gw-r", 3600, 86400)));
        let (sync, store, gateway) = setup(gateway).await;

        let row = sync.synchronize("u1", "fortytwo").await.unwrap();

        assert_eq!(row.user_id, "u1");
        assert_eq!(row.provider_id, "gateway");
        assert_eq!(row.account_id, "g-123");
        assert_eq!(row.access_token.as_deref(), Some("gw-a"));
        assert_eq!(row.refresh_token.as_deref(), Some("gw-r"));
        assert_eq!(row.id.len(), 21);
        assert_eq!(store.find_account("u1", GATEWAY_PROVIDER_ID).await.unwrap(), Some(row));
        assert_eq!(
            gateway.calls()[0],
            gateway_link_test_utils::GatewayCall::Login {
                provider: "fortytwo".into(),
                upstream_access_token: "tok-up".into()
            }
        );
    }

    #[tokio::test]
    async fn test_expiries_from_single_issuance_instant() {
        let (sync, _, _) = setup(MockGateway::default()).await;
        let row = sync.synchronize("u1", "fortytwo").await.unwrap();

        let t = t0().timestamp_millis();
        assert_eq!(row.access_token_expires_at.unwrap().timestamp_millis(), t + 3_600_000);
        assert_eq!(row.refresh_token_expires_at.unwrap().timestamp_millis(), t + 86_400_000);
        assert_eq!(row.created_at, t0());
        assert_eq!(row.updated_at, t0());
    }

    #[tokio::test]
    async fn test_second_sign_in_overwrites_tokens() {
        let store = MemoryAccountStore::with_accounts(vec![upstream_account("u1", "fortytwo", "tok-up")]);
        let gateway = Arc::new(MockGateway::new("g-1"));
        let clock = Arc::new(gateway_link_core::utils::FixedClock::new(t0()));
        let ctx = crate::test_support::context_with_clock(store.clone(), gateway.clone(), clock.clone());
        let sync = TokenLinkSynchronizer::new(ctx);

        let first = sync.synchronize("u1", "fortytwo").await.unwrap();
        clock.advance(Duration::minutes(10));
        let second = sync.synchronize("u1", "fortytwo").await.unwrap();

        assert_eq!(store.provider_count(GATEWAY_PROVIDER_ID).await, 1);
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.access_token.as_deref(), Some("gw-access-2"));
        assert_eq!(
            second.access_token_expires_at,
            Some(t0() + Duration::minutes(10) + Duration::seconds(3600))
        );
        assert_eq!(gateway.login_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_upstream_account() {
        let (sync, _, gateway) = setup(MockGateway::default()).await;
        let err = sync.synchronize("u1", "google").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamAccountNotFound);
        assert_eq!(gateway.calls().len(), 0);
    }

    #[tokio::test]
    async fn test_upstream_row_without_token() {
        let mut upstream = upstream_account("u1", "fortytwo", "");
        upstream.access_token = None;
        let store = MemoryAccountStore::with_accounts(vec![upstream]);
        let gateway = Arc::new(MockGateway::default());
        let sync = TokenLinkSynchronizer::new(context(store, gateway.clone(), Default::default()));

        let err = sync.synchronize("u1", "fortytwo").await.unwrap_err();
        assert!(matches!(err, GatewayLinkError::UpstreamAuth { .. }));
        assert_eq!(gateway.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_gateway_provider_is_not_an_upstream() {
        let (sync, _, gateway) = setup(MockGateway::default()).await;
        let err = sync.synchronize("u1", "gateway").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamAccountNotFound);
        assert_eq!(gateway.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_failure_skips_identity_and_write() {
        let gateway = MockGateway::default();
        gateway.push_login(Err(GatewayApiError::Status { status: 400, message: "bad token".into() }));
        let (sync, store, gateway) = setup(gateway).await;

        let err = sync.synchronize("u1", "fortytwo").await.unwrap_err();
        assert!(matches!(err, GatewayLinkError::GatewayLogin(_)));
        assert_eq!(gateway.who_am_i_calls(), 0);
        assert_eq!(store.provider_count(GATEWAY_PROVIDER_ID).await, 0);
    }

    #[tokio::test]
    async fn test_login_timeout_is_login_error() {
        let gateway = MockGateway::default();
        gateway.push_login(Err(GatewayApiError::Timeout));
        let (sync, _, _) = setup(gateway).await;
        let err = sync.synchronize("u1", "fortytwo").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::GatewayLoginFailed);
    }

    #[tokio::test]
    async fn test_identity_failure_writes_nothing() {
        let gateway = MockGateway::default();
        gateway.push_who_am_i(Err(GatewayApiError::Status { status: 401, message: "expired".into() }));
        let (sync, store, gateway) = setup(gateway).await;

        let err = sync.synchronize("u1", "fortytwo").await.unwrap_err();
        assert!(err.requires_reauthentication());
        assert_eq!(gateway.login_calls(), 1);
        assert_eq!(store.provider_count(GATEWAY_PROVIDER_ID).await, 0);
    }

    #[tokio::test]
    async fn test_account_id_mismatch_kept_by_default() {
        let (sync, _, gateway) = setup(MockGateway::new("g-1")).await;
        sync.synchronize("u1", "fortytwo").await.unwrap();

        gateway.push_who_am_i(Ok(GatewayUser::new("g-2")));
        let row = sync.synchronize("u1", "fortytwo").await.unwrap();
        assert_eq!(row.account_id, "g-1");
        assert_eq!(row.access_token.as_deref(), Some("gw-access-2"));
    }

    #[tokio::test]
    async fn test_account_id_mismatch_rejected_by_policy() {
        let store = MemoryAccountStore::with_accounts(vec![upstream_account("u1", "fortytwo", "tok-up")]);
        let gateway = Arc::new(MockGateway::new("g-1"));
        let options = gateway_link_core::GatewayLinkOptions::default()
            .with_account_id_policy(AccountIdPolicy::Reject);
        let sync = TokenLinkSynchronizer::new(context(store.clone(), gateway.clone(), options));

        let first = sync.synchronize("u1", "fortytwo").await.unwrap();
        gateway.push_who_am_i(Ok(GatewayUser::new("g-2")));
        let err = sync.synchronize("u1", "fortytwo").await.unwrap_err();

        assert!(matches!(err, GatewayLinkError::AccountMismatch { ref stored, ref reported, .. }
            if stored == "g-1" && reported == "g-2"));
        let row = store.find_account("u1", GATEWAY_PROVIDER_ID).await.unwrap().unwrap();
        assert_eq!(row, first);
    }

    #[tokio::test]
    async fn test_out_of_range_login_lifetime_is_login_error() {
        for (expires_in, refresh_in) in [(10_000_000_000_000, 86400), (i64::MAX / 10, 86400), (3600, -1)] {
            let gateway = MockGateway::default();
            gateway.push_login(Ok(MockGateway::grant("gw-a", "gw-r", expires_in, refresh_in)));
            let (sync, store, gateway) = setup(gateway).await;

            let err = sync.synchronize("u1", "fortytwo").await.unwrap_err();
            assert!(matches!(err, GatewayLinkError::GatewayLogin(GatewayApiError::Decode(_))));
            assert_eq!(err.code(), ErrorCode::GatewayLoginFailed);
            assert_eq!(gateway.who_am_i_calls(), 0);
            assert_eq!(store.provider_count(GATEWAY_PROVIDER_ID).await, 0);
        }
    }
}
