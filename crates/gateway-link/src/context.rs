// Link context — the collaborators every component needs.
//
// Created once by `GatewayLink` and shared as `Arc<LinkContext>`.

use std::sync::Arc;

use gateway_link_core::{AccountStore, Clock, GatewayApi, GatewayLinkOptions};

pub struct LinkContext {
    /// Linked-account persistence.
    pub store: Arc<dyn AccountStore>,

    /// Gateway account API.
    pub gateway: Arc<dyn GatewayApi>,

    pub options: GatewayLinkOptions,

    /// Source of issuance instants and expiry checks.
    pub clock: Arc<dyn Clock>,
}

impl LinkContext {
    pub fn gateway_provider_id(&self) -> &str {
        &self.options.gateway_provider_id
    }
}

impl std::fmt::Debug for LinkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkContext")
            .field("store", &self.store)
            .field("gateway", &self.gateway)
            .field("options", &self.options)
            .finish()
    }
}
