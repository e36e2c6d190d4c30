// gateway-link-sqlx — SQL account store.
//
// Implements `AccountStore` over `sqlx::AnyPool`, supporting SQLite and
// Postgres through a single runtime-polymorphic pool. Rows live in the
// identity provider's `account` table.

pub mod schema;
pub mod store;

pub use schema::{ddl, migrate, ACCOUNT_TABLE};
pub use store::SqlxAccountStore;
