pub mod models;
pub mod store;

pub use models::{LinkedAccount, TokenSet, GATEWAY_PROVIDER_ID};
pub use store::{AccountStore, StoreResult, Upserted};
