//! Configuration (layered: explicit setters > env > built-in defaults).

pub mod environment;

pub use environment::{Endpoints, Environment};

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::AuthError;

pub const TOKEN_ENV_VAR: &str = "OPTIMA_TOKEN";
pub const ENVIRONMENT_ENV_VAR: &str = "OPTIMA_ENV";
pub const ADS_BACKEND_URL_ENV_VAR: &str = "ADS_BACKEND_URL";

const DEFAULT_CLI_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SERVICE_AUTH_URL: &str = "https://auth.optima.onl";
const DEFAULT_SERVICE_SCOPE: &str = "api:internal";

/// Settings for the command-line client.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Environment requested through `OPTIMA_ENV`, if any.
    pub environment: Option<Environment>,
    /// Bearer token that bypasses the token file for this process.
    pub token_override: Option<String>,
    pub ads_api_override: Option<String>,
    pub token_path: PathBuf,
    pub http_timeout: Duration,
    auth_url_override: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            environment: None,
            token_override: None,
            ads_api_override: None,
            token_path: default_token_path(),
            http_timeout: DEFAULT_CLI_TIMEOUT,
            auth_url_override: None,
        }
    }
}

impl CliConfig {
    /// Load from the process environment (a `.env` file is honored if present).
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let mut config = Self::default();
        config.token_override = non_empty(lookup(TOKEN_ENV_VAR));
        config.ads_api_override = non_empty(lookup(ADS_BACKEND_URL_ENV_VAR));
        if let Some(raw) = non_empty(lookup(ENVIRONMENT_ENV_VAR)) {
            let env = Environment::from_str(raw.trim()).map_err(|_| {
                AuthError::Configuration(format!(
                    "{ENVIRONMENT_ENV_VAR}={raw} is not one of ci, stage, prod"
                ))
            })?;
            config.environment = Some(env);
        }
        if let Some(secs) = parse_timeout(&lookup)? {
            config.http_timeout = secs;
        }
        Ok(config)
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        self.token_override = token;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Point every environment at one authorization server (local testing).
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url_override = Some(trim_url(url.into()));
        self
    }

    /// Endpoints for `environment`, with any auth URL override applied.
    pub fn endpoints(&self, environment: Environment) -> Endpoints {
        let mut endpoints = environment.endpoints();
        if let Some(url) = &self.auth_url_override {
            endpoints.auth_url = url.clone();
        }
        if let Some(url) = &self.ads_api_override {
            endpoints.ads_api_url = trim_url(url.clone());
        }
        endpoints
    }
}

/// Settings for the backend's client-credentials identity.
#[derive(Clone)]
pub struct ServiceConfig {
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("scope", &self.scope)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new(
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: trim_url(auth_url.into()),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: DEFAULT_SERVICE_SCOPE.to_string(),
            http_timeout: DEFAULT_SERVICE_TIMEOUT,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Load `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`, `USER_AUTH_URL`, `OAUTH_SCOPE`.
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let auth_url =
            non_empty(lookup("USER_AUTH_URL")).unwrap_or_else(|| DEFAULT_SERVICE_AUTH_URL.into());
        let client_id = lookup("OAUTH_CLIENT_ID").unwrap_or_default();
        let client_secret = lookup("OAUTH_CLIENT_SECRET").unwrap_or_default();
        if client_id.is_empty() || client_secret.is_empty() {
            tracing::warn!("OAUTH_CLIENT_ID or OAUTH_CLIENT_SECRET not configured");
        }
        let mut config = Self::new(auth_url, client_id, client_secret);
        if let Some(scope) = non_empty(lookup("OAUTH_SCOPE")) {
            config.scope = scope;
        }
        if let Some(timeout) = parse_timeout(&lookup)? {
            config.http_timeout = timeout;
        }
        tracing::info!(auth_url = %config.auth_url, "auth client configured");
        Ok(config)
    }
}

/// `~/.optima/token.json`, shared with other Optima command-line tools.
pub fn default_token_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".optima"))
        .unwrap_or_else(|| PathBuf::from(".optima"))
        .join("token.json")
}

fn parse_timeout(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<Duration>, AuthError> {
    let Some(raw) = non_empty(lookup("AUTH_HTTP_TIMEOUT_SECS")) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(AuthError::Configuration(format!(
            "AUTH_HTTP_TIMEOUT_SECS must be a positive integer, got {raw}"
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
