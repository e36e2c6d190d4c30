// Schema for the linked-account table.
//
// Columns use the identity provider's camelCase names, so the store can sit
// on an existing `account` table. Timestamps are RFC 3339 TEXT. The unique
// index on ("userId", "providerId") is created separately so it can be added
// to a table that predates it; the atomic upsert depends on it.

use sqlx::AnyPool;

use gateway_link_core::GatewayLinkError;

pub const ACCOUNT_TABLE: &str = "account";

/// Quote an identifier for SQLite/Postgres.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', ""))
}

/// DDL statements for the account table, in execution order.
pub fn ddl(table: &str) -> Vec<String> {
    let t = quote_identifier(table);
    let index = quote_identifier(&format!("{table}_userId_providerId_uidx"));
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {t} (\
             \"id\" TEXT PRIMARY KEY NOT NULL, \
             \"accountId\" TEXT NOT NULL, \
             \"providerId\" TEXT NOT NULL, \
             \"userId\" TEXT NOT NULL, \
             \"accessToken\" TEXT, \
             \"refreshToken\" TEXT, \
             \"accessTokenExpiresAt\" TEXT, \
             \"refreshTokenExpiresAt\" TEXT, \
             \"createdAt\" TEXT NOT NULL, \
             \"updatedAt\" TEXT NOT NULL)"
        ),
        format!("CREATE UNIQUE INDEX IF NOT EXISTS {index} ON {t} (\"userId\", \"providerId\")"),
    ]
}

/// Create the account table and its unique key if they do not exist.
pub async fn migrate(pool: &AnyPool, table: &str) -> Result<(), GatewayLinkError> {
    for stmt in ddl(table) {
        sqlx::query(&stmt)
            .execute(pool)
            .await
            .map_err(|e| GatewayLinkError::Database(format!("Migration failed: {e}\nSQL: {stmt}")))?;
    }
    tracing::debug!(table, "account schema ready");
    Ok(())
}
