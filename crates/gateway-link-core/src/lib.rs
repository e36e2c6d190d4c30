#![doc = include_str!("../README.md")]

pub mod db;
pub mod env;
pub mod error;
pub mod gateway;
pub mod hooks;
pub mod options;
pub mod utils;

// Re-exports for convenience
pub use db::models::{LinkedAccount, TokenSet, GATEWAY_PROVIDER_ID};
pub use db::store::{AccountStore, StoreResult, Upserted};
pub use env::{init_logger, ExecutionContext, GatewayConfig, UpstreamProviderConfig};
pub use error::{ErrorCode, GatewayApiError, GatewayLinkError, Result};
pub use gateway::{GatewayApi, GatewayTokenResponse, GatewayUser};
pub use hooks::{AuthHook, HookContext, HookError, HookRegistry, HookResult, HookTiming, SessionRef};
pub use options::{AccountIdPolicy, GatewayLinkOptions};
pub use utils::{Clock, SystemClock};
