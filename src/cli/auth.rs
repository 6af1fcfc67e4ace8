//! CLI auth command handlers for login, status, logout and token.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::{AuthError, AuthService, DeviceFlowObserver, LoginOutcome, TokenRecord};
use crate::config::{CliConfig, Environment};

/// Prints device-flow progress to the terminal.
struct ConsoleObserver {
    open_browser: bool,
}

impl DeviceFlowObserver for ConsoleObserver {
    fn on_code(&self, user_code: &str, verification_uri: &str) {
        println!("Complete the sign-in in your browser:");
        println!();
        println!("   Code: {user_code}");
        println!();
        println!("   Or open directly:");
        println!("   {verification_uri}");
        println!();
        if self.open_browser {
            if let Err(err) = open::that(verification_uri) {
                debug!(error = %err, "could not open browser");
            }
        }
        println!("⏳ Waiting for authorization...");
    }

    fn on_success(&self, record: &TokenRecord) {
        println!("✅ Logged in");
        if let Some(email) = record.email() {
            println!("   Account: {email}");
        }
    }

    fn on_failure(&self, error: &AuthError) {
        eprintln!("❌ Login failed: {error}");
    }
}

/// Handle `ads-auth auth login`.
pub async fn handle_login(
    env: Option<Environment>,
    open_browser: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = AuthService::from_config(CliConfig::from_env()?);
    let environment = service.environment(env);

    println!("🔐 Signing in to Optima");
    println!("   Environment: {environment}");
    println!();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let observer = ConsoleObserver { open_browser };
    let outcome = service.login(environment, &observer, &cancel).await;
    ctrl_c.abort();

    match outcome {
        Ok(LoginOutcome::AlreadyLoggedIn(record)) => {
            println!("⚠️  Already logged in");
            if let Some(email) = record.email() {
                println!("   Account: {email}");
            }
            println!("   Environment: {}", record.environment);
            println!();
            println!("To switch accounts run: ads-auth auth logout");
            Ok(())
        }
        Ok(LoginOutcome::LoggedIn(_)) => {
            println!();
            println!("Next: ads-auth auth status");
            Ok(())
        }
        Err(err) => Err(with_hint(err)),
    }
}

/// Handle `ads-auth auth status`.
pub async fn handle_status(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let service = AuthService::from_config(CliConfig::from_env()?);
    let status = service.status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if !status.logged_in {
        println!("⚠️  Not logged in");
        println!("Run: ads-auth auth login");
        return Ok(());
    }

    println!("🔐 Authentication Status\n");
    if status.env_override {
        println!("  Source: OPTIMA_TOKEN environment variable");
    }
    let state = if status.expired {
        "⚠️  Expired"
    } else {
        "✅ Authenticated"
    };
    println!("  Status: {state}");
    if let Some(env) = status.environment {
        println!("  Environment: {env}");
    }
    if let Some(identity) = &status.identity {
        if let Some(email) = &identity.email {
            println!("  Account: {email}");
        }
        if let Some(name) = &identity.display_name {
            println!("  Name: {name}");
        }
    }
    if let Some(expires_at) = status.expires_at {
        println!("  Expires: {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
    }
    if status.expired {
        println!();
        println!("The session will be refreshed on next use, or run: ads-auth auth login");
    }
    Ok(())
}

/// Handle `ads-auth auth logout`.
pub async fn handle_logout() -> Result<(), Box<dyn std::error::Error>> {
    let service = AuthService::from_config(CliConfig::from_env()?);
    match service.logout()? {
        Some(record) => {
            println!("✅ Logged out");
            if let Some(email) = record.email() {
                println!("   Account: {email}");
            }
        }
        None => println!("⚠️  Not logged in"),
    }
    Ok(())
}

/// Handle `ads-auth auth token`.
pub async fn handle_token() -> Result<(), Box<dyn std::error::Error>> {
    let service = AuthService::from_config(CliConfig::from_env()?);
    let token = service.bearer_token().await.map_err(with_hint)?;
    println!("{token}");
    Ok(())
}

fn with_hint(err: AuthError) -> Box<dyn std::error::Error> {
    match err.recovery_hint() {
        Some(hint) => format!("{err} ({hint})").into(),
        None => Box::new(err),
    }
}
