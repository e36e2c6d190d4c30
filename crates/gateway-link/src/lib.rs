// gateway-link — keeps identity-provider users linked to gateway tokens.
//
// Wires the synchronizer, token provider, lifecycle hook adapter and session
// enricher around one shared `LinkContext`.

pub mod context;
pub mod session;
pub mod session_hooks;
pub mod synchronizer;
pub mod token_provider;

use std::sync::Arc;

use gateway_link_core::{
    AccountStore, Clock, GatewayApi, GatewayLinkError, GatewayLinkOptions, GatewayUser,
    HookRegistry, LinkedAccount, Result, SystemClock,
};

pub use context::LinkContext;
pub use session::{GatewaySessionEnricher, SessionTransformer};
pub use session_hooks::SessionHookAdapter;
pub use synchronizer::TokenLinkSynchronizer;
pub use token_provider::GatewayTokenProvider;

/// Entry point for an identity-provider integration.
///
/// ```rust,ignore
/// let link = GatewayLink::new(store, Arc::new(HttpGateway::new(&config)), options);
/// let mut hooks = HookRegistry::new();
/// link.register_hooks(&mut hooks);
/// // after each auth endpoint: hooks.run_after(&ctx).await
/// // before each auth endpoint: hooks.run_before(&ctx).await
/// ```
#[derive(Debug, Clone)]
pub struct GatewayLink {
    ctx: Arc<LinkContext>,
    synchronizer: TokenLinkSynchronizer,
    tokens: Arc<GatewayTokenProvider>,
    hooks: Arc<SessionHookAdapter>,
}

impl GatewayLink {
    pub fn new(
        store: Arc<dyn AccountStore>,
        gateway: Arc<dyn GatewayApi>,
        options: GatewayLinkOptions,
    ) -> Self {
        Self::with_clock(store, gateway, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn AccountStore>,
        gateway: Arc<dyn GatewayApi>,
        options: GatewayLinkOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ctx = Arc::new(LinkContext {
            store,
            gateway,
            options,
            clock,
        });
        let synchronizer = TokenLinkSynchronizer::new(ctx.clone());
        let tokens = Arc::new(GatewayTokenProvider::new(ctx.clone()));
        let hooks = Arc::new(SessionHookAdapter::new(
            ctx.clone(),
            synchronizer.clone(),
            tokens.clone(),
        ));
        Self {
            ctx,
            synchronizer,
            tokens,
            hooks,
        }
    }

    pub fn context(&self) -> &Arc<LinkContext> {
        &self.ctx
    }

    pub fn hook_adapter(&self) -> &SessionHookAdapter {
        &self.hooks
    }

    /// Add the post-callback and pre-sign-out hooks to `registry`.
    pub fn register_hooks(&self, registry: &mut HookRegistry) {
        registry.register(self.hooks.clone());
    }

    pub fn session_enricher(&self) -> GatewaySessionEnricher {
        GatewaySessionEnricher::new(self.tokens.clone())
    }

    // ─── Operations ──────────────────────────────────────────────

    pub async fn synchronize(&self, user_id: &str, provider_id: &str) -> Result<LinkedAccount> {
        self.synchronizer.synchronize(user_id, provider_id).await
    }

    pub async fn current_token(&self, user_id: &str) -> Result<String> {
        self.tokens.current_token(user_id).await
    }

    pub async fn fresh_token(&self, user_id: &str) -> Result<String> {
        self.tokens.fresh_token(user_id).await
    }

    pub async fn logout(&self, user_id: &str) -> Result<()> {
        self.hooks.logout(user_id).await
    }

    /// The gateway's profile of `user_id`, fetched with their stored token.
    pub async fn get_me(&self, user_id: &str) -> Result<GatewayUser> {
        let token = self.tokens.current_token(user_id).await?;
        self.ctx.gateway.who_am_i(&token).await.map_err(|e| {
            tracing::warn!(user_id, error = %e, "gateway profile lookup failed");
            GatewayLinkError::GatewayIdentity(e)
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use gateway_link_core::utils::FixedClock;
    use gateway_link_core::{GatewayLinkOptions, LinkedAccount};
    use gateway_link_memory::MemoryAccountStore;
    use gateway_link_test_utils::MockGateway;

    use crate::context::LinkContext;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    pub fn upstream_account(user_id: &str, provider_id: &str, token: &str) -> LinkedAccount {
        LinkedAccount {
            id: format!("{user_id}-{provider_id}"),
            account_id: format!("{provider_id}-{user_id}"),
            provider_id: provider_id.to_string(),
            user_id: user_id.to_string(),
            access_token: Some(token.to_string()),
            refresh_token: None,
            access_token_expires_at: None,
            refresh_token_expires_at: None,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    pub fn context(
        store: MemoryAccountStore,
        gateway: Arc<MockGateway>,
        options: GatewayLinkOptions,
    ) -> Arc<LinkContext> {
        Arc::new(LinkContext {
            store: Arc::new(store),
            gateway,
            options,
            clock: Arc::new(FixedClock::new(t0())),
        })
    }

    pub fn context_with_clock(
        store: MemoryAccountStore,
        gateway: Arc<MockGateway>,
        clock: Arc<FixedClock>,
    ) -> Arc<LinkContext> {
        Arc::new(LinkContext {
            store: Arc::new(store),
            gateway,
            options: GatewayLinkOptions::default(),
            clock,
        })
    }
}
