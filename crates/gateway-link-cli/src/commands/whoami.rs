// `gateway-link whoami` — the gateway's view of a linked user.

use clap::Args;
use colored::Colorize;

use super::{open_link, DatabaseArgs};

#[derive(Args)]
pub struct WhoamiArgs {
    /// Identity-provider user id
    #[arg(short, long)]
    user: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    db: DatabaseArgs,
}

pub async fn run(args: WhoamiArgs) -> Result<(), Box<dyn std::error::Error>> {
    let link = open_link(&args.db).await?;
    let me = link.get_me(&args.user).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&me)?);
        return Ok(());
    }

    println!("{} {}", "Gateway user:".bold(), me.id.cyan());
    let mut keys: Vec<_> = me.extra.keys().collect();
    keys.sort();
    for key in keys {
        println!("  {} {}: {}", "·".dimmed(), key, me.extra[key.as_str()]);
    }
    Ok(())
}
