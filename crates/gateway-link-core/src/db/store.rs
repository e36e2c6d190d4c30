// Account store trait — the persistence seam every backend implements.
//
// Rows are addressed by `(userId, providerId)`; stores must enforce that at
// most one row exists per key. `upsert_account` is the write used by the
// synchronizer and must be atomic at the store level so that concurrent
// sign-ins of one user converge on a single row.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{LinkedAccount, TokenSet};
use crate::error::GatewayLinkError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, GatewayLinkError>;

/// Outcome of an atomic upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted {
    /// No row existed; the candidate was inserted as given.
    Created(LinkedAccount),
    /// A row existed; its token columns and `updatedAt` were replaced.
    /// `id`, `accountId` and `createdAt` are those of the existing row.
    Updated(LinkedAccount),
}

impl Upserted {
    pub fn account(&self) -> &LinkedAccount {
        match self {
            Self::Created(a) | Self::Updated(a) => a,
        }
    }

    pub fn into_account(self) -> LinkedAccount {
        match self {
            Self::Created(a) | Self::Updated(a) => a,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Persistence interface over linked-account rows.
#[async_trait]
pub trait AccountStore: Send + Sync + fmt::Debug {
    /// Point read by `(user_id, provider_id)`.
    async fn find_account(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> StoreResult<Option<LinkedAccount>>;

    /// Insert a new row. Fails if a row with the same key already exists.
    async fn insert_account(&self, account: LinkedAccount) -> StoreResult<LinkedAccount>;

    /// Replace the token columns of an existing row.
    /// Returns `None` if no row matches.
    async fn update_tokens(
        &self,
        user_id: &str,
        provider_id: &str,
        tokens: &TokenSet,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<LinkedAccount>>;

    /// Insert `candidate`, or if its key already exists, overwrite only the
    /// token columns and `updatedAt` of the stored row. Atomic.
    async fn upsert_account(&self, candidate: LinkedAccount) -> StoreResult<Upserted>;
}

/// Error for an insert that would violate the `(userId, providerId)` key.
pub fn duplicate_key(user_id: &str, provider_id: &str) -> GatewayLinkError {
    GatewayLinkError::Database(format!(
        "account ({user_id}, {provider_id}) already exists"
    ))
}
