use clap::{Parser, Subcommand};

mod commands;

/// gateway-link CLI — inspect and operate the gateway account link
#[derive(Parser)]
#[command(name = "gateway-link", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate gateway and upstream provider configuration from the environment
    CheckConfig(commands::check_config::CheckConfigArgs),

    /// Create the account table and its unique key
    Migrate(commands::migrate::MigrateArgs),

    /// Print a user's stored gateway access token
    Token(commands::token::TokenArgs),

    /// Fetch a user's gateway profile with their stored token
    Whoami(commands::whoami::WhoamiArgs),
}

#[tokio::main]
async fn main() {
    gateway_link_core::init_logger();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::CheckConfig(args) => commands::check_config::run(args),
        Commands::Migrate(args) => commands::migrate::run(args).await,
        Commands::Token(args) => commands::token::run(args).await,
        Commands::Whoami(args) => commands::whoami::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", colored::Colorize::red("error:"), e);
        std::process::exit(1);
    }
}
