use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::provider::{PollResponse, ProviderClient, TokenResponse};
use super::store::TokenStore;
use super::token::TokenRecord;
use crate::config::Environment;
use crate::time::{add_secs, Clock, Sleeper, SystemClock, TokioSleeper};

/// Extra delay added to the poll interval on every `slow_down`.
pub const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// A pending device authorization. Lives only as long as one login attempt.
///
/// # Example
/// ```
/// use ads_auth::auth::DeviceSession;
/// use chrono::{Duration, Utc};
///
/// let session = DeviceSession {
///     device_code: "device-code".to_string(),
///     user_code: "ABCD-EFGH".to_string(),
///     verification_uri: "https://auth.optima.onl/device".to_string(),
///     verification_uri_complete: None,
///     expires_at: Utc::now() + Duration::minutes(10),
///     interval: std::time::Duration::from_secs(5),
/// };
/// assert_eq!(session.display_uri(), "https://auth.optima.onl/device");
/// ```
#[derive(Debug, Clone)]
pub struct DeviceSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub interval: Duration,
}

impl DeviceSession {
    /// The URI to show the user, preferring the one with the code embedded.
    pub fn display_uri(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .unwrap_or(&self.verification_uri)
    }
}

/// Where a device login currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFlowState {
    Requesting,
    AwaitingUser { interval: Duration },
    Polling { interval: Duration, attempts: u32 },
    Succeeded(TokenResponse),
    Denied,
    /// The provider reported `expired_token`.
    Expired,
    /// The session's own deadline passed locally.
    TimedOut,
    Errored(AuthError),
    Cancelled,
}

/// Inputs that move a [`DeviceFlowState`].
#[derive(Debug, Clone)]
pub enum DeviceFlowEvent {
    CodeIssued { interval: Duration },
    Woke { now: DateTime<Utc>, expires_at: DateTime<Utc> },
    Polled(PollResponse),
    PollFailed(AuthError),
    Cancelled,
}

impl DeviceFlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded(_)
                | Self::Denied
                | Self::Expired
                | Self::TimedOut
                | Self::Errored(_)
                | Self::Cancelled
        )
    }

    /// Current wait between polls, if still waiting.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::AwaitingUser { interval } | Self::Polling { interval, .. } => Some(*interval),
            _ => None,
        }
    }

    /// Pure transition function. Terminal states absorb every event.
    pub fn transition(self, event: DeviceFlowEvent) -> Self {
        use DeviceFlowEvent as Event;

        if self.is_terminal() {
            return self;
        }
        match (self, event) {
            (_, Event::Cancelled) => Self::Cancelled,
            (Self::Requesting, Event::CodeIssued { interval }) => Self::AwaitingUser { interval },
            (Self::AwaitingUser { interval }, Event::Woke { now, expires_at }) => {
                if now >= expires_at {
                    Self::TimedOut
                } else {
                    Self::Polling {
                        interval,
                        attempts: 0,
                    }
                }
            }
            (state @ Self::Polling { .. }, Event::Woke { now, expires_at }) => {
                if now >= expires_at {
                    Self::TimedOut
                } else {
                    state
                }
            }
            (Self::Polling { interval, attempts }, Event::Polled(response)) => {
                let attempts = attempts + 1;
                match response {
                    PollResponse::Token(token) => Self::Succeeded(token),
                    PollResponse::Pending => Self::Polling { interval, attempts },
                    PollResponse::SlowDown => Self::Polling {
                        interval: interval + SLOW_DOWN_STEP,
                        attempts,
                    },
                    PollResponse::ExpiredToken => Self::Expired,
                    PollResponse::AccessDenied => Self::Denied,
                    PollResponse::Error(description) => {
                        Self::Errored(AuthError::ProviderRejected(description))
                    }
                    PollResponse::Unparseable(body) => {
                        Self::Errored(AuthError::InvalidResponse(body))
                    }
                }
            }
            (Self::Polling { .. }, Event::PollFailed(err)) => Self::Errored(err),
            (state, event) => {
                debug!(?state, ?event, "ignoring out-of-order device flow event");
                state
            }
        }
    }
}

/// UI hooks for a device login. Called synchronously from the polling task.
pub trait DeviceFlowObserver: Send + Sync {
    /// The user code and the URI to open are ready.
    fn on_code(&self, user_code: &str, verification_uri: &str);
    /// About to make poll number `attempt` (1-based).
    fn on_poll(&self, _attempt: u32) {}
    fn on_success(&self, record: &TokenRecord);
    fn on_failure(&self, error: &AuthError);
}

/// Drives the OAuth device authorization grant for one environment.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use ads_auth::auth::{DeviceAuthClient, FileTokenStore, ProviderClient};
/// use ads_auth::config::Environment;
///
/// # async fn example() -> Result<(), ads_auth::auth::AuthError> {
/// let env = Environment::Production;
/// let endpoints = env.endpoints();
/// let provider = ProviderClient::new(endpoints.auth_url, Duration::from_secs(30))?;
/// let client = DeviceAuthClient::new(
///     provider,
///     endpoints.client_id,
///     env,
///     Arc::new(FileTokenStore::new_default()),
/// );
/// let session = client.request_device_code().await?;
/// println!("enter {} at {}", session.user_code, session.display_uri());
/// # Ok(())
/// # }
/// ```
pub struct DeviceAuthClient {
    provider: ProviderClient,
    client_id: String,
    environment: Environment,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl DeviceAuthClient {
    pub fn new(
        provider: ProviderClient,
        client_id: impl Into<String>,
        environment: Environment,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            provider,
            client_id: client_id.into(),
            environment,
            store,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Ask the provider for a device and user code.
    pub async fn request_device_code(&self) -> Result<DeviceSession, AuthError> {
        let payload = self.provider.request_device_code(&self.client_id).await?;
        let interval = payload.poll_interval();
        Ok(DeviceSession {
            expires_at: add_secs(self.clock.now(), payload.expires_in),
            device_code: payload.device_code,
            user_code: payload.user_code,
            verification_uri: payload.verification_uri,
            verification_uri_complete: payload.verification_uri_complete,
            interval,
        })
    }

    /// Poll until the user approves, the provider refuses, the session
    /// lapses, or `cancel` fires. Exactly one of `on_success`/`on_failure`
    /// is invoked.
    pub async fn run(
        &self,
        session: DeviceSession,
        observer: &dyn DeviceFlowObserver,
        cancel: &CancellationToken,
    ) -> Result<TokenRecord, AuthError> {
        observer.on_code(&session.user_code, session.display_uri());
        let result = match self.poll_until_terminal(&session, observer, cancel).await {
            DeviceFlowState::Succeeded(token) => self.complete(token).await,
            terminal => Err(terminal_error(terminal)),
        };
        match &result {
            Ok(record) => observer.on_success(record),
            Err(err) => observer.on_failure(err),
        }
        result
    }

    async fn poll_until_terminal(
        &self,
        session: &DeviceSession,
        observer: &dyn DeviceFlowObserver,
        cancel: &CancellationToken,
    ) -> DeviceFlowState {
        let mut state = DeviceFlowState::Requesting.transition(DeviceFlowEvent::CodeIssued {
            interval: session.interval,
        });

        while let Some(interval) = state.interval() {
            state = tokio::select! {
                biased;
                _ = cancel.cancelled() => state.transition(DeviceFlowEvent::Cancelled),
                _ = self.sleeper.sleep(interval) => state.transition(DeviceFlowEvent::Woke {
                    now: self.clock.now(),
                    expires_at: session.expires_at,
                }),
            };
            let DeviceFlowState::Polling { attempts, .. } = &state else {
                continue;
            };
            observer.on_poll(attempts + 1);

            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => DeviceFlowEvent::Cancelled,
                polled = self.provider.poll_device_token(&self.client_id, &session.device_code) => {
                    match polled {
                        Ok(response) => DeviceFlowEvent::Polled(response),
                        Err(err) => DeviceFlowEvent::PollFailed(err),
                    }
                }
            };
            match &event {
                DeviceFlowEvent::Polled(PollResponse::Pending) => {
                    debug!("authorization pending")
                }
                DeviceFlowEvent::Polled(PollResponse::SlowDown) => {
                    debug!(step_secs = SLOW_DOWN_STEP.as_secs(), "provider asked to slow down")
                }
                _ => {}
            }
            state = state.transition(event);
        }
        state
    }

    async fn complete(&self, token: TokenResponse) -> Result<TokenRecord, AuthError> {
        let issued_at = self.clock.now();
        // Identity is best-effort; a session without it is still usable.
        let identity = match self.provider.user_info(&token.access_token).await {
            Ok(info) => Some(info.into()),
            Err(err) => {
                warn!(error = %err, "could not fetch user info after login");
                None
            }
        };
        let record = TokenRecord::from_response(&token, self.environment, identity, issued_at);
        self.store.save(&record)?;
        info!(env = %self.environment, "device login succeeded");
        Ok(record)
    }
}

fn terminal_error(state: DeviceFlowState) -> AuthError {
    match state {
        DeviceFlowState::Denied => AuthError::AuthorizationDenied,
        DeviceFlowState::Expired => AuthError::AuthorizationExpired,
        DeviceFlowState::TimedOut => AuthError::AuthorizationTimeout,
        DeviceFlowState::Cancelled => AuthError::Cancelled,
        DeviceFlowState::Errored(err) => err,
        other => AuthError::InvalidResponse(format!("device flow stopped in {other:?}")),
    }
}
