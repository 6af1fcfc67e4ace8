//! Ads Auth — credential and token lifecycle for the Optima Ads tooling.
//!
//! The command-line client signs users in with the OAuth device
//! authorization grant and keeps the resulting session in
//! `~/.optima/token.json`. The backend authenticates itself with a cached
//! client-credentials token and uses it to verify the bearer tokens its
//! callers present.
//!
//! # Quick Start
//!
//! ```no_run
//! use ads_auth::auth::AuthService;
//! use ads_auth::config::CliConfig;
//!
//! # async fn example() -> Result<(), ads_auth::auth::AuthError> {
//! let service = AuthService::from_config(CliConfig::from_env()?);
//! let bearer = service.bearer_token().await?;
//! println!("Authorization: Bearer {bearer}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod prelude;
pub mod time;

#[cfg(feature = "cli")]
pub mod cli;
