//! CLI entry point for ads-auth.

pub mod auth;

use clap::{Parser, Subcommand};

use crate::config::Environment;

/// Optima Ads credential CLI
#[derive(Parser, Debug)]
#[command(name = "ads-auth", version, about = "Optima Ads — sign-in and session management")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Sign in with a one-time code
    Login(LoginArgs),
    /// Show the current session
    Status(StatusArgs),
    /// Remove the stored session
    Logout,
    /// Print a valid bearer token, refreshing the session if needed
    Token,
}

/// Arguments for `ads-auth auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Environment to sign in to (ci, stage, prod)
    #[arg(long)]
    pub env: Option<Environment>,
    /// Print the verification link without opening a browser
    #[arg(long)]
    pub no_open: bool,
}

/// Arguments for `ads-auth auth status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}
