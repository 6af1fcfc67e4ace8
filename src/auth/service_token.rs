//! Client-credentials token cache for service-to-service calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info};

use super::error::AuthError;
use super::expiry::{expires_within, DEFAULT_EXPIRY_MARGIN};
use super::provider::ProviderClient;
use crate::config::ServiceConfig;
use crate::time::{add_secs, Clock, SystemClock};

/// Client id, secret and scope for the client-credentials grant.
#[derive(Clone)]
pub struct ServiceCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

type SharedExchange = Shared<BoxFuture<'static, Result<CachedToken, AuthError>>>;

#[derive(Default)]
struct CacheState {
    entry: Option<CachedToken>,
    inflight: Option<SharedExchange>,
}

/// Result of [`ServiceTokenCache::health_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

/// In-memory cache of one service token, refreshed ahead of expiry.
///
/// Concurrent callers that miss the cache share a single in-flight
/// exchange and all receive its outcome. The exchange runs on its own task,
/// so it completes even if every caller waiting on it is dropped. A failed
/// exchange leaves the previous entry in place.
///
/// # Example
/// ```no_run
/// use ads_auth::auth::ServiceTokenCache;
/// use ads_auth::config::ServiceConfig;
///
/// # async fn example() -> Result<(), ads_auth::auth::AuthError> {
/// let cache = ServiceTokenCache::from_config(&ServiceConfig::from_env()?)?;
/// let bearer = cache.get_token(false).await?;
/// # let _ = bearer;
/// # Ok(())
/// # }
/// ```
pub struct ServiceTokenCache {
    provider: ProviderClient,
    credentials: Arc<ServiceCredentials>,
    clock: Arc<dyn Clock>,
    margin: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl ServiceTokenCache {
    pub fn new(provider: ProviderClient, credentials: ServiceCredentials) -> Self {
        Self {
            provider,
            credentials: Arc::new(credentials),
            clock: Arc::new(SystemClock),
            margin: DEFAULT_EXPIRY_MARGIN,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, AuthError> {
        let provider = ProviderClient::new(config.auth_url.clone(), config.http_timeout)?;
        Ok(Self::new(
            provider,
            ServiceCredentials {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                scope: config.scope.clone(),
            },
        ))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Identifies what this cache holds a token for.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.credentials.client_id, self.credentials.scope)
    }

    /// A valid service token, exchanging for a new one when needed.
    ///
    /// `force_refresh` skips the cached entry but still joins an exchange
    /// that is already running.
    pub async fn get_token(&self, force_refresh: bool) -> Result<String, AuthError> {
        let exchange = {
            let mut state = self.lock_state();
            if !force_refresh {
                if let Some(entry) = &state.entry {
                    if !expires_within(entry.expires_at, self.clock.now(), self.margin) {
                        debug!(key = %self.cache_key(), "service token cache hit");
                        return Ok(entry.token.clone());
                    }
                }
            }
            match &state.inflight {
                Some(inflight) => inflight.clone(),
                None => {
                    let exchange = self.start_exchange();
                    state.inflight = Some(exchange.clone());
                    exchange
                }
            }
        };
        exchange.await.map(|entry| entry.token)
    }

    pub async fn health_check(&self) -> HealthStatus {
        match self.get_token(false).await {
            Ok(_) => HealthStatus::Healthy,
            Err(err) => HealthStatus::Unhealthy(err.to_string()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_exchange(&self) -> SharedExchange {
        let provider = self.provider.clone();
        let credentials = Arc::clone(&self.credentials);
        let clock = Arc::clone(&self.clock);
        let state = Arc::clone(&self.state);

        let exchange = tokio::spawn(async move {
            debug!(client_id = %credentials.client_id, "fetching new service token");
            let issued_at = clock.now();
            let result = provider
                .client_credentials(
                    &credentials.client_id,
                    &credentials.client_secret,
                    &credentials.scope,
                )
                .await
                .map(|resp| CachedToken {
                    expires_at: add_secs(issued_at, resp.expires_in_or_default()),
                    token: resp.access_token,
                });

            {
                let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                match &result {
                    Ok(entry) => {
                        info!(expires_at = %entry.expires_at, "service token obtained");
                        guard.entry = Some(entry.clone());
                    }
                    Err(err) => error!(error = %err, "failed to get service token"),
                }
                guard.inflight = None;
            }
            result
        });

        async move {
            exchange.await.unwrap_or_else(|err| {
                Err(AuthError::ProviderUnavailable(format!(
                    "service token exchange did not complete: {err}"
                )))
            })
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ServiceTokenCache {
        let provider =
            ProviderClient::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap();
        ServiceTokenCache::new(
            provider,
            ServiceCredentials {
                client_id: "ads-backend".to_string(),
                client_secret: "s3cret".to_string(),
                scope: "api:internal".to_string(),
            },
        )
    }

    #[test]
    fn cache_key_combines_client_and_scope() {
        assert_eq!(cache().cache_key(), "ads-backend:api:internal");
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let rendered = format!("{:?}", cache().credentials);
        assert!(!rendered.contains("s3cret"));
    }

    #[tokio::test]
    async fn unreachable_provider_is_reported_unhealthy() {
        match cache().health_check().await {
            HealthStatus::Unhealthy(reason) => assert!(reason.contains("unavailable")),
            HealthStatus::Healthy => panic!("expected unhealthy"),
        }
    }
}
