//! ads-auth CLI binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ads_auth::cli::{AuthCommands, Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login(args) => {
                ads_auth::cli::auth::handle_login(args.env, !args.no_open).await
            }
            AuthCommands::Status(args) => ads_auth::cli::auth::handle_status(args.json).await,
            AuthCommands::Logout => ads_auth::cli::auth::handle_logout().await,
            AuthCommands::Token => ads_auth::cli::auth::handle_token().await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
