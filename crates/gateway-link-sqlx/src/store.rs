// SqlxAccountStore — `AccountStore` over `sqlx::AnyPool`.
//
// Queries use positional `$N` placeholders and quoted camelCase columns.
// `upsert_account` is `INSERT ... ON CONFLICT DO NOTHING RETURNING` followed,
// when nothing was inserted, by `UPDATE ... RETURNING` on the same key. The
// unique index decides the single creator among concurrent writers.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use gateway_link_core::db::store::duplicate_key;
use gateway_link_core::{AccountStore, GatewayLinkError, LinkedAccount, StoreResult, TokenSet, Upserted};

use crate::schema::{self, quote_identifier, ACCOUNT_TABLE};

const COLUMNS: &str = "\"id\", \"accountId\", \"providerId\", \"userId\", \"accessToken\", \
     \"refreshToken\", \"accessTokenExpiresAt\", \"refreshTokenExpiresAt\", \"createdAt\", \"updatedAt\"";

/// SQL-backed account store.
#[derive(Debug, Clone)]
pub struct SqlxAccountStore {
    pool: AnyPool,
    table: String,
}

impl SqlxAccountStore {
    /// Create a store from an existing pool, using the `account` table.
    pub fn new(pool: AnyPool) -> Self {
        Self {
            pool,
            table: ACCOUNT_TABLE.to_string(),
        }
    }

    /// Use a different table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Connect to a database URL (`sqlite:...`, `postgres://...`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        sqlx::any::install_default_drivers();

        // Every connection to "sqlite::memory:" opens a separate database.
        let pool = if url.contains(":memory:") || url.contains("mode=memory") {
            sqlx::any::AnyPoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
        } else {
            AnyPool::connect(url).await
        }
        .map_err(|e| GatewayLinkError::Database(format!("Database connection failed: {e}")))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the account table and unique key if missing.
    pub async fn migrate(&self) -> StoreResult<()> {
        schema::migrate(&self.pool, &self.table).await
    }

    fn table_ident(&self) -> String {
        quote_identifier(&self.table)
    }
}

// ─── Row Mapping ─────────────────────────────────────────────────

fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn opt_ts(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(ts)
}

fn parse_ts(column: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GatewayLinkError::Database(format!("invalid timestamp in \"{column}\": {e}")))
}

fn get_text(row: &AnyRow, column: &str) -> StoreResult<String> {
    row.try_get::<String, _>(column)
        .map_err(|e| GatewayLinkError::Database(format!("failed to read \"{column}\": {e}")))
}

fn get_opt_text(row: &AnyRow, column: &str) -> StoreResult<Option<String>> {
    row.try_get::<Option<String>, _>(column)
        .map_err(|e| GatewayLinkError::Database(format!("failed to read \"{column}\": {e}")))
}

fn get_opt_ts(row: &AnyRow, column: &str) -> StoreResult<Option<DateTime<Utc>>> {
    get_opt_text(row, column)?
        .map(|raw| parse_ts(column, &raw))
        .transpose()
}

fn row_to_account(row: &AnyRow) -> StoreResult<LinkedAccount> {
    Ok(LinkedAccount {
        id: get_text(row, "id")?,
        account_id: get_text(row, "accountId")?,
        provider_id: get_text(row, "providerId")?,
        user_id: get_text(row, "userId")?,
        access_token: get_opt_text(row, "accessToken")?,
        refresh_token: get_opt_text(row, "refreshToken")?,
        access_token_expires_at: get_opt_ts(row, "accessTokenExpiresAt")?,
        refresh_token_expires_at: get_opt_ts(row, "refreshTokenExpiresAt")?,
        created_at: parse_ts("createdAt", &get_text(row, "createdAt")?)?,
        updated_at: parse_ts("updatedAt", &get_text(row, "updatedAt")?)?,
    })
}

fn query_failed(e: sqlx::Error) -> GatewayLinkError {
    GatewayLinkError::Database(format!("Query failed: {e}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl AccountStore for SqlxAccountStore {
    async fn find_account(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> StoreResult<Option<LinkedAccount>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE \"userId\" = $1 AND \"providerId\" = $2",
            self.table_ident()
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn insert_account(&self, account: LinkedAccount) -> StoreResult<LinkedAccount> {
        let sql = format!(
            "INSERT INTO {} ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            self.table_ident()
        );
        sqlx::query(&sql)
            .bind(account.id.clone())
            .bind(account.account_id.clone())
            .bind(account.provider_id.clone())
            .bind(account.user_id.clone())
            .bind(account.access_token.clone())
            .bind(account.refresh_token.clone())
            .bind(opt_ts(account.access_token_expires_at))
            .bind(opt_ts(account.refresh_token_expires_at))
            .bind(ts(account.created_at))
            .bind(ts(account.updated_at))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    duplicate_key(&account.user_id, &account.provider_id)
                } else {
                    query_failed(e)
                }
            })?;
        Ok(account)
    }

    async fn update_tokens(
        &self,
        user_id: &str,
        provider_id: &str,
        tokens: &TokenSet,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<LinkedAccount>> {
        let sql = format!(
            "UPDATE {} SET \"accessToken\" = $1, \"refreshToken\" = $2, \
             \"accessTokenExpiresAt\" = $3, \"refreshTokenExpiresAt\" = $4, \"updatedAt\" = $5 \
             WHERE \"userId\" = $6 AND \"providerId\" = $7 RETURNING {COLUMNS}",
            self.table_ident()
        );
        let row = sqlx::query(&sql)
            .bind(tokens.access_token.clone())
            .bind(tokens.refresh_token.clone())
            .bind(ts(tokens.access_token_expires_at))
            .bind(ts(tokens.refresh_token_expires_at))
            .bind(ts(updated_at))
            .bind(user_id)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn upsert_account(&self, candidate: LinkedAccount) -> StoreResult<Upserted> {
        // Insert-or-nothing first: a returned row means this call created it,
        // whatever id the candidate carries.
        let insert = format!(
            "INSERT INTO {} ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT DO NOTHING RETURNING {COLUMNS}",
            self.table_ident()
        );
        let inserted = sqlx::query(&insert)
            .bind(candidate.id.clone())
            .bind(candidate.account_id.clone())
            .bind(candidate.provider_id.clone())
            .bind(candidate.user_id.clone())
            .bind(candidate.access_token.clone())
            .bind(candidate.refresh_token.clone())
            .bind(opt_ts(candidate.access_token_expires_at))
            .bind(opt_ts(candidate.refresh_token_expires_at))
            .bind(ts(candidate.created_at))
            .bind(ts(candidate.updated_at))
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;
        if let Some(row) = inserted {
            return Ok(Upserted::Created(row_to_account(&row)?));
        }

        // The key exists (rows are never deleted), so overwrite its tokens.
        let update = format!(
            "UPDATE {} SET \"accessToken\" = $1, \"refreshToken\" = $2, \
             \"accessTokenExpiresAt\" = $3, \"refreshTokenExpiresAt\" = $4, \"updatedAt\" = $5 \
             WHERE \"userId\" = $6 AND \"providerId\" = $7 RETURNING {COLUMNS}",
            self.table_ident()
        );
        let updated = sqlx::query(&update)
            .bind(candidate.access_token.clone())
            .bind(candidate.refresh_token.clone())
            .bind(opt_ts(candidate.access_token_expires_at))
            .bind(opt_ts(candidate.refresh_token_expires_at))
            .bind(ts(candidate.updated_at))
            .bind(candidate.user_id.clone())
            .bind(candidate.provider_id.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        match updated {
            Some(row) => Ok(Upserted::Updated(row_to_account(&row)?)),
            // The insert collided on the row id of a different key.
            None => Err(GatewayLinkError::Database(format!(
                "account id {} is already used by another row",
                candidate.id
            ))),
        }
    }
}
