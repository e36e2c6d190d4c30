// `gateway-link token` — print a user's gateway access token, optionally
// refreshing it first.

use clap::Args;

use super::{open_link, DatabaseArgs};

#[derive(Args)]
pub struct TokenArgs {
    /// Identity-provider user id
    #[arg(short, long)]
    user: String,

    /// Refresh through the gateway if the token is about to expire
    #[arg(long)]
    refresh: bool,

    #[command(flatten)]
    db: DatabaseArgs,
}

pub async fn run(args: TokenArgs) -> Result<(), Box<dyn std::error::Error>> {
    let link = open_link(&args.db).await?;
    let token = if args.refresh {
        link.fresh_token(&args.user).await?
    } else {
        link.current_token(&args.user).await?
    };
    println!("{token}");
    Ok(())
}
