pub mod check_config;
pub mod migrate;
pub mod token;
pub mod whoami;

use std::sync::Arc;

use clap::Args;

use gateway_link::GatewayLink;
use gateway_link_client::HttpGateway;
use gateway_link_core::{GatewayConfig, GatewayLinkOptions};
use gateway_link_sqlx::{SqlxAccountStore, ACCOUNT_TABLE};

/// Database selection shared by the commands that touch the account table.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database URL (`sqlite:...` or `postgres://...`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Account table name
    #[arg(long, default_value = ACCOUNT_TABLE)]
    pub table: String,
}

impl DatabaseArgs {
    pub async fn store(&self) -> Result<SqlxAccountStore, Box<dyn std::error::Error>> {
        let store = SqlxAccountStore::connect(&self.database_url)
            .await?
            .with_table(self.table.clone());
        Ok(store)
    }
}

/// A `GatewayLink` over the SQL store and the HTTP gateway configured in the environment.
pub async fn open_link(db: &DatabaseArgs) -> Result<GatewayLink, Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env()?;
    let store = db.store().await?;
    Ok(GatewayLink::new(
        Arc::new(store),
        Arc::new(HttpGateway::new(&config)),
        GatewayLinkOptions::default(),
    ))
}
