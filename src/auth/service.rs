use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::device_code::{DeviceAuthClient, DeviceFlowObserver};
use super::error::AuthError;
use super::expiry::is_expired;
use super::provider::ProviderClient;
use super::refresh::RefreshFlow;
use super::store::{FileTokenStore, TokenStore};
use super::token::{Identity, TokenRecord};
use crate::config::{CliConfig, Environment};
use crate::time::{Clock, Sleeper, SystemClock, TokioSleeper};

/// Result of [`AuthService::login`].
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// A non-expired session already exists; nothing was requested.
    AlreadyLoggedIn(TokenRecord),
    LoggedIn(TokenRecord),
}

/// Snapshot of the local session, as shown by `auth status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub logged_in: bool,
    pub expired: bool,
    #[serde(rename = "env")]
    pub environment: Option<Environment>,
    #[serde(rename = "user")]
    pub identity: Option<Identity>,
    pub expires_at: Option<DateTime<Utc>>,
    /// The bearer comes from `OPTIMA_TOKEN` rather than the token file.
    pub env_override: bool,
}

/// Session orchestration for the command-line client.
///
/// All printing and prompting belong to the caller; this only returns
/// typed results.
///
/// # Example
/// ```no_run
/// use ads_auth::auth::AuthService;
/// use ads_auth::config::CliConfig;
///
/// # async fn example() -> Result<(), ads_auth::auth::AuthError> {
/// let service = AuthService::from_config(CliConfig::from_env()?);
/// let bearer = service.bearer_token().await?;
/// # let _ = bearer;
/// # Ok(())
/// # }
/// ```
pub struct AuthService {
    config: CliConfig,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl AuthService {
    pub fn new(config: CliConfig, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Use the file store at `config.token_path`, honoring `OPTIMA_TOKEN`.
    pub fn from_config(config: CliConfig) -> Self {
        let store = FileTokenStore::new(config.token_path.clone())
            .with_env_override(config.token_override.clone());
        Self::new(config, Arc::new(store))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// `requested`, else `OPTIMA_ENV`, else the stored session's, else prod.
    pub fn environment(&self, requested: Option<Environment>) -> Environment {
        requested
            .or(self.config.environment)
            .or_else(|| self.store.load_or_absent().map(|r| r.environment))
            .unwrap_or_default()
    }

    pub fn device_client(&self, environment: Environment) -> Result<DeviceAuthClient, AuthError> {
        let endpoints = self.config.endpoints(environment);
        let provider = ProviderClient::new(endpoints.auth_url, self.config.http_timeout)?;
        Ok(
            DeviceAuthClient::new(provider, endpoints.client_id, environment, self.store.clone())
                .with_clock(self.clock.clone())
                .with_sleeper(self.sleeper.clone()),
        )
    }

    pub fn refresh_flow(&self, environment: Environment) -> Result<RefreshFlow, AuthError> {
        let endpoints = self.config.endpoints(environment);
        let provider = ProviderClient::new(endpoints.auth_url, self.config.http_timeout)?;
        Ok(RefreshFlow::new(provider, endpoints.client_id, self.store.clone())
            .with_clock(self.clock.clone()))
    }

    /// Run a device login unless a valid session already exists.
    pub async fn login(
        &self,
        environment: Environment,
        observer: &dyn DeviceFlowObserver,
        cancel: &CancellationToken,
    ) -> Result<LoginOutcome, AuthError> {
        if let Some(existing) = self.store.load_or_absent() {
            if !is_expired(&existing, self.clock.as_ref()) {
                return Ok(LoginOutcome::AlreadyLoggedIn(existing));
            }
        }
        let client = self.device_client(environment)?;
        let session = match client.request_device_code().await {
            Ok(session) => session,
            Err(err) => {
                observer.on_failure(&err);
                return Err(err);
            }
        };
        client
            .run(session, observer, cancel)
            .await
            .map(LoginOutcome::LoggedIn)
    }

    /// Describe the local session.
    ///
    /// A live session saved without identity gets it looked up and written
    /// back to the store; a failed lookup only leaves `identity` empty.
    pub async fn status(&self) -> AuthStatus {
        let env_override = self.store.env_override().is_some();
        match self.store.load_or_absent() {
            Some(record) => {
                let expired = is_expired(&record, self.clock.as_ref());
                let record = if expired || record.identity.is_some() {
                    record
                } else {
                    self.backfill_identity(record).await
                };
                AuthStatus {
                    logged_in: true,
                    expired,
                    environment: Some(record.environment),
                    identity: record.identity,
                    expires_at: Some(record.expires_at),
                    env_override,
                }
            }
            None => AuthStatus {
                logged_in: env_override,
                expired: false,
                environment: self.config.environment,
                identity: None,
                expires_at: None,
                env_override,
            },
        }
    }

    async fn backfill_identity(&self, mut record: TokenRecord) -> TokenRecord {
        let endpoints = self.config.endpoints(record.environment);
        let info = match ProviderClient::new(endpoints.auth_url, self.config.http_timeout) {
            Ok(provider) => provider.user_info(&record.access_token).await,
            Err(err) => Err(err),
        };
        match info {
            Ok(info) => {
                record.identity = Some(info.into());
                if let Err(err) = self.store.save(&record) {
                    warn!(error = %err, "could not cache user info in token file");
                }
            }
            Err(err) => warn!(error = %err, "could not fetch user info for status"),
        }
        record
    }

    /// Remove the stored session, returning what was removed.
    pub fn logout(&self) -> Result<Option<TokenRecord>, AuthError> {
        let previous = self.store.load_or_absent();
        self.store.clear()?;
        Ok(previous)
    }

    /// Pre-flight for API calls: a bearer that is valid right now.
    ///
    /// An `OPTIMA_TOKEN` override is returned as-is. An expired stored
    /// session is refreshed once; if that fails the user must log in again.
    pub async fn bearer_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.store.env_override() {
            return Ok(token);
        }
        let record = self.store.load_or_absent().ok_or(AuthError::NotLoggedIn)?;
        if !is_expired(&record, self.clock.as_ref()) {
            return Ok(record.access_token);
        }
        debug!(env = %record.environment, "stored session expired, refreshing");
        let refreshed = self.refresh_flow(record.environment)?.refresh(&record).await?;
        Ok(refreshed.access_token)
    }

    /// Base URL of the ads API for the active environment.
    pub fn ads_api_url(&self) -> String {
        self.config.endpoints(self.environment(None)).ads_api_url
    }
}
