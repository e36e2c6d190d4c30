// Session enrichment — adds the gateway access token to session responses.
//
// The identity provider runs a `SessionTransformer` over the `{ user, session }`
// JSON it is about to return. `GatewaySessionEnricher` sets
// `user.gatewayToken` from the stored gateway row.

use std::sync::Arc;

use async_trait::async_trait;

use gateway_link_core::GatewayLinkError;

use crate::token_provider::GatewayTokenProvider;

/// Transforms `{ user, session }` session data before it is returned.
#[async_trait]
pub trait SessionTransformer: Send + Sync + std::fmt::Debug {
    async fn transform(
        &self,
        session_data: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayLinkError>;
}

#[derive(Debug, Clone)]
pub struct GatewaySessionEnricher {
    tokens: Arc<GatewayTokenProvider>,
}

impl GatewaySessionEnricher {
    pub fn new(tokens: Arc<GatewayTokenProvider>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl SessionTransformer for GatewaySessionEnricher {
    /// Users without a gateway link get `gatewayToken: null`. Store failures
    /// are returned.
    async fn transform(
        &self,
        session_data: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayLinkError> {
        let user_id = session_data
            .get("user")
            .and_then(|u| u.get("id"))
            .and_then(|id| id.as_str())
            .ok_or_else(|| anyhow::anyhow!("session data has no user.id"))?;

        let token = match self.tokens.current_token(user_id).await {
            Ok(token) => serde_json::Value::String(token),
            Err(GatewayLinkError::GatewayAccountNotFound { .. }) => serde_json::Value::Null,
            Err(e) => return Err(e),
        };

        let mut data = session_data.clone();
        if let Some(user) = data.get_mut("user").and_then(|u| u.as_object_mut()) {
            user.insert("gatewayToken".to_string(), token);
        }
        Ok(data)
    }
}
