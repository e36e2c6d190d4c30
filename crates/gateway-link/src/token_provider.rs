// GatewayTokenProvider — the read path for a user's gateway access token.
//
// `current_token` is a plain read. `fresh_token` refreshes through the
// gateway when the stored access token is about to expire; refreshes for one
// user are serialized so a rotated refresh token is never spent twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gateway_link_core::{GatewayLinkError, LinkedAccount, Result};

use crate::context::LinkContext;

#[derive(Debug)]
pub struct GatewayTokenProvider {
    ctx: Arc<LinkContext>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GatewayTokenProvider {
    pub fn new(ctx: Arc<LinkContext>) -> Self {
        Self {
            ctx,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The stored gateway row for `user_id`.
    pub async fn gateway_account(&self, user_id: &str) -> Result<LinkedAccount> {
        self.ctx
            .store
            .find_account(user_id, self.ctx.gateway_provider_id())
            .await?
            .ok_or_else(|| GatewayLinkError::GatewayAccountNotFound {
                user_id: user_id.to_string(),
            })
    }

    /// The stored gateway access token, without any expiry check.
    pub async fn current_token(&self, user_id: &str) -> Result<String> {
        self.gateway_account(user_id)
            .await?
            .access_token
            .ok_or_else(|| GatewayLinkError::GatewayAccountNotFound {
                user_id: user_id.to_string(),
            })
    }

    /// Like [`current_token`](Self::current_token), but if the access token
    /// expires within the configured leeway it is first exchanged using the
    /// stored refresh token and the new tokens are persisted.
    ///
    /// Fails with `GatewayRefresh` when the refresh token is missing, expired
    /// or rejected; the caller must then re-authenticate.
    pub async fn fresh_token(&self, user_id: &str) -> Result<String> {
        let account = self.gateway_account(user_id).await?;
        if !self.needs_refresh(&account) {
            return token_of(account, user_id);
        }

        let lock = self.refresh_lock(user_id);
        let guard = lock.lock().await;

        // Another caller may have refreshed while we waited.
        let account = self.gateway_account(user_id).await?;
        let result = if self.needs_refresh(&account) {
            self.refresh(account).await
        } else {
            token_of(account, user_id)
        };

        drop(guard);
        self.release_refresh_lock(user_id, lock);
        result
    }

    fn needs_refresh(&self, account: &LinkedAccount) -> bool {
        account.access_token_expires_within(self.ctx.clock.now(), self.ctx.options.refresh_leeway())
    }

    async fn refresh(&self, account: LinkedAccount) -> Result<String> {
        let user_id = account.user_id.clone();
        let now = self.ctx.clock.now();

        if account.refresh_token_expired(now) {
            tracing::warn!(user_id = %user_id, "gateway refresh token expired");
            return Err(GatewayLinkError::GatewayRefresh(
                "refresh token has expired".to_string(),
            ));
        }
        let refresh_token = account
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayLinkError::GatewayRefresh("no refresh token stored".to_string()))?;

        tracing::debug!(user_id = %user_id, "refreshing gateway token");
        let grant = self.ctx.gateway.refresh(&refresh_token).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "gateway refresh failed");
            GatewayLinkError::GatewayRefresh(e.to_string())
        })?;

        let issued_at = self.ctx.clock.now();
        let tokens = grant.to_token_set(issued_at).map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "gateway refresh returned unusable lifetimes");
            GatewayLinkError::GatewayRefresh(e.to_string())
        })?;

        let stored = self
            .ctx
            .store
            .update_tokens(&user_id, &account.provider_id, &tokens, issued_at)
            .await?
            .ok_or_else(|| GatewayLinkError::GatewayAccountNotFound {
                user_id: user_id.clone(),
            })?;
        tracing::info!(user_id = %user_id, "gateway token refreshed");
        token_of(stored, &user_id)
    }

    fn refresh_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.refresh_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(user_id.to_string()).or_default().clone()
    }

    fn release_refresh_lock(&self, user_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.refresh_locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(lock);
        // Only the map still holds it: nobody is waiting.
        if locks.get(user_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(user_id);
        }
    }
}

fn token_of(account: LinkedAccount, user_id: &str) -> Result<String> {
    account
        .access_token
        .ok_or_else(|| GatewayLinkError::GatewayAccountNotFound {
            user_id: user_id.to_string(),
        })
}
