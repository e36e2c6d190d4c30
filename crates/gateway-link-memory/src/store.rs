// In-memory account store — HashMap keyed by (userId, providerId).
//
// Thread-safe via `tokio::sync::RwLock`. The read-modify-write of
// `upsert_account` happens under a single write guard, which is what makes
// it atomic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use gateway_link_core::db::store::duplicate_key;
use gateway_link_core::{AccountStore, LinkedAccount, StoreResult, TokenSet, Upserted};

type Key = (String, String);
type Store = HashMap<Key, LinkedAccount>;

fn key(user_id: &str, provider_id: &str) -> Key {
    (user_id.to_string(), provider_id.to_string())
}

/// In-memory account store.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    store: Arc<RwLock<Store>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `accounts`. Later duplicates win.
    pub fn with_accounts(accounts: impl IntoIterator<Item = LinkedAccount>) -> Self {
        let store = accounts
            .into_iter()
            .map(|a| (key(&a.user_id, &a.provider_id), a))
            .collect();
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// All rows, ordered by (userId, providerId) (for debugging/testing).
    pub async fn snapshot(&self) -> Vec<LinkedAccount> {
        let mut rows: Vec<LinkedAccount> = self.store.read().await.values().cloned().collect();
        rows.sort_by(|a, b| {
            (a.user_id.as_str(), a.provider_id.as_str()).cmp(&(b.user_id.as_str(), b.provider_id.as_str()))
        });
        rows
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Number of rows stored under `provider_id`.
    pub async fn provider_count(&self, provider_id: &str) -> usize {
        self.store
            .read()
            .await
            .keys()
            .filter(|(_, p)| p == provider_id)
            .count()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_account(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> StoreResult<Option<LinkedAccount>> {
        Ok(self.store.read().await.get(&key(user_id, provider_id)).cloned())
    }

    async fn insert_account(&self, account: LinkedAccount) -> StoreResult<LinkedAccount> {
        let mut store = self.store.write().await;
        let k = key(&account.user_id, &account.provider_id);
        if store.contains_key(&k) {
            return Err(duplicate_key(&account.user_id, &account.provider_id));
        }
        store.insert(k, account.clone());
        Ok(account)
    }

    async fn update_tokens(
        &self,
        user_id: &str,
        provider_id: &str,
        tokens: &TokenSet,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<LinkedAccount>> {
        let mut store = self.store.write().await;
        Ok(store.get_mut(&key(user_id, provider_id)).map(|row| {
            row.apply_tokens(tokens, updated_at);
            row.clone()
        }))
    }

    async fn upsert_account(&self, candidate: LinkedAccount) -> StoreResult<Upserted> {
        let mut store = self.store.write().await;
        let k = key(&candidate.user_id, &candidate.provider_id);
        match store.get_mut(&k) {
            Some(row) => {
                row.access_token = candidate.access_token;
                row.refresh_token = candidate.refresh_token;
                row.access_token_expires_at = candidate.access_token_expires_at;
                row.refresh_token_expires_at = candidate.refresh_token_expires_at;
                row.updated_at = candidate.updated_at;
                Ok(Upserted::Updated(row.clone()))
            }
            None => {
                store.insert(k, candidate.clone());
                Ok(Upserted::Created(candidate))
            }
        }
    }
}
