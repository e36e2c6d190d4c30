// SessionHookAdapter — identity-provider lifecycle events → gateway protocol.
//
// Post-callback: after an upstream OAuth sign-in created a session, link the
// user to the gateway before the endpoint returns.
// Pre-sign-out: revoke the user's gateway session. Best effort; local
// sign-out always proceeds.

use std::sync::Arc;

use async_trait::async_trait;

use gateway_link_core::utils::route_matches_any;
use gateway_link_core::{AuthHook, GatewayLinkError, HookContext, HookError, HookResult, HookTiming};

use crate::context::LinkContext;
use crate::synchronizer::TokenLinkSynchronizer;
use crate::token_provider::GatewayTokenProvider;

#[derive(Debug, Clone)]
pub struct SessionHookAdapter {
    ctx: Arc<LinkContext>,
    synchronizer: TokenLinkSynchronizer,
    tokens: Arc<GatewayTokenProvider>,
}

impl SessionHookAdapter {
    pub fn new(
        ctx: Arc<LinkContext>,
        synchronizer: TokenLinkSynchronizer,
        tokens: Arc<GatewayTokenProvider>,
    ) -> Self {
        Self {
            ctx,
            synchronizer,
            tokens,
        }
    }

    pub fn is_callback(&self, ctx: &HookContext) -> bool {
        route_matches_any(self.ctx.options.callback_paths.as_slice(), &ctx.path)
    }

    pub fn is_sign_out(&self, ctx: &HookContext) -> bool {
        route_matches_any(self.ctx.options.sign_out_paths.as_slice(), &ctx.path)
    }

    /// Run after an OAuth callback. Non-callback paths are ignored.
    ///
    /// Identity failures redirect to the logout route so the half-created
    /// local session is torn down; every other failure aborts the callback.
    pub async fn on_post_callback(&self, ctx: &HookContext) -> HookResult {
        if !self.is_callback(ctx) {
            return HookResult::Continue;
        }
        let Some(user_id) = ctx.new_session_user_id() else {
            tracing::debug!(path = %ctx.path, "callback created no session; nothing to link");
            return HookResult::Continue;
        };
        let param = &self.ctx.options.provider_param;
        let Some(provider_id) = ctx.param(param).filter(|p| !p.is_empty()) else {
            let err = GatewayLinkError::Config(format!(
                "callback context has no \"{param}\" route parameter"
            ));
            tracing::error!(user_id, path = %ctx.path, "{err}");
            return HookResult::Fail(HookError::from(&err));
        };

        match self.synchronizer.synchronize(user_id, provider_id).await {
            Ok(_) => HookResult::Continue,
            Err(err) if err.requires_reauthentication() => {
                tracing::warn!(user_id, provider_id, error = %err, "forcing logout");
                HookResult::Redirect(self.ctx.options.logout_redirect.clone())
            }
            Err(err) => HookResult::Fail(HookError::from(&err)),
        }
    }

    /// Run before sign-out. Always returns `Continue`.
    pub async fn on_pre_sign_out(&self, ctx: &HookContext) -> HookResult {
        if !self.is_sign_out(ctx) {
            return HookResult::Continue;
        }
        let Some(user_id) = ctx.session_user_id() else {
            tracing::debug!("sign-out without a session; skipping gateway logout");
            return HookResult::Continue;
        };
        if let Err(err) = self.logout(user_id).await {
            tracing::warn!(user_id, error = %err, "gateway logout failed; continuing local sign-out");
        }
        HookResult::Continue
    }

    /// Revoke the gateway session of `user_id`.
    pub async fn logout(&self, user_id: &str) -> Result<(), GatewayLinkError> {
        let token = self.tokens.current_token(user_id).await?;
        self.ctx
            .gateway
            .logout(&token)
            .await
            .map_err(GatewayLinkError::GatewayLogout)?;
        tracing::info!(user_id, "gateway session revoked");
        Ok(())
    }
}

#[async_trait]
impl AuthHook for SessionHookAdapter {
    fn id(&self) -> &str {
        "gateway-link"
    }

    fn matches(&self, timing: HookTiming, ctx: &HookContext) -> bool {
        match timing {
            HookTiming::After => self.is_callback(ctx),
            HookTiming::Before => self.is_sign_out(ctx),
        }
    }

    async fn call(&self, timing: HookTiming, ctx: &HookContext) -> HookResult {
        match timing {
            HookTiming::After => self.on_post_callback(ctx).await,
            HookTiming::Before => self.on_pre_sign_out(ctx).await,
        }
    }
}
