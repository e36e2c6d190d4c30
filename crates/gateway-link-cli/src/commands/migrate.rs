// `gateway-link migrate` — create the account table and its
// ("userId", "providerId") unique key.

use clap::Args;
use colored::Colorize;

use super::DatabaseArgs;

#[derive(Args)]
pub struct MigrateArgs {
    #[command(flatten)]
    db: DatabaseArgs,

    /// Print the DDL instead of running it
    #[arg(long)]
    dry_run: bool,
}

pub async fn run(args: MigrateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let statements = gateway_link_sqlx::ddl(&args.db.table);

    if args.dry_run {
        for stmt in &statements {
            println!("{stmt};");
        }
        return Ok(());
    }

    println!("{} Table: {}", "●".cyan(), args.db.table);
    let store = args.db.store().await?;
    store.migrate().await?;
    tracing::info!(table = %args.db.table, "migration applied");

    println!(
        "{}",
        format!("✓ {} statement(s) applied", statements.len()).green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(dry_run: bool) -> MigrateArgs {
        MigrateArgs {
            db: DatabaseArgs {
                database_url: "sqlite::memory:".into(),
                table: "account".into(),
            },
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_dry_run_does_not_connect() {
        let mut a = args(true);
        a.db.database_url = "postgres://127.0.0.1:1/unreachable".into();
        assert!(run(a).await.is_ok());
    }

    #[tokio::test]
    async fn test_migrate_sqlite() {
        assert!(run(args(false)).await.is_ok());
    }
}
