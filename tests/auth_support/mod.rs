#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ads_auth::auth::{AuthError, DeviceFlowObserver, StorageError, TokenRecord, TokenStore};
use ads_auth::config::Environment;
use ads_auth::time::{ManualClock, Sleeper};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use wiremock::{Request, Respond, ResponseTemplate};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 4, 3, 2, 1).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
    env_token: Option<String>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env_token(token: &str) -> Self {
        Self {
            record: Mutex::new(None),
            env_token: Some(token.to_string()),
        }
    }

    pub fn seed(&self, record: TokenRecord) {
        *self.record.lock().expect("store lock poisoned") = Some(record);
    }

    pub fn get(&self) -> Option<TokenRecord> {
        self.record.lock().expect("store lock poisoned").clone()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> Result<Option<TokenRecord>, StorageError> {
        Ok(self.get())
    }

    fn save(&self, record: &TokenRecord) -> Result<(), StorageError> {
        self.seed(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.record.lock().expect("store lock poisoned") = None;
        Ok(())
    }

    fn env_override(&self) -> Option<String> {
        self.env_token.clone()
    }
}

/// A store whose writes always fail.
pub struct ReadOnlyTokenStore;

impl TokenStore for ReadOnlyTokenStore {
    fn load(&self) -> Result<Option<TokenRecord>, StorageError> {
        Ok(None)
    }

    fn save(&self, _record: &TokenRecord) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }

    fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Returns at once, moving the manual clock forward by the requested time.
pub struct InstantSleeper {
    clock: Arc<ManualClock>,
    slept: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            slept: Mutex::new(Vec::new()),
        }
    }

    pub fn slept_secs(&self) -> Vec<u64> {
        self.slept
            .lock()
            .expect("sleeper lock poisoned")
            .iter()
            .map(Duration::as_secs)
            .collect()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .expect("sleeper lock poisoned")
            .push(duration);
        self.clock.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Records every observer callback.
#[derive(Default)]
pub struct RecordingObserver {
    pub codes: Mutex<Vec<(String, String)>>,
    pub polls: Mutex<Vec<u32>>,
    pub successes: Mutex<Vec<TokenRecord>>,
    pub failures: Mutex<Vec<AuthError>>,
}

impl RecordingObserver {
    pub fn poll_count(&self) -> usize {
        self.polls.lock().expect("observer lock poisoned").len()
    }

    pub fn success_count(&self) -> usize {
        self.successes.lock().expect("observer lock poisoned").len()
    }

    pub fn failures(&self) -> Vec<AuthError> {
        self.failures.lock().expect("observer lock poisoned").clone()
    }
}

impl DeviceFlowObserver for RecordingObserver {
    fn on_code(&self, user_code: &str, verification_uri: &str) {
        self.codes
            .lock()
            .expect("observer lock poisoned")
            .push((user_code.to_string(), verification_uri.to_string()));
    }

    fn on_poll(&self, attempt: u32) {
        self.polls.lock().expect("observer lock poisoned").push(attempt);
    }

    fn on_success(&self, record: &TokenRecord) {
        self.successes
            .lock()
            .expect("observer lock poisoned")
            .push(record.clone());
    }

    fn on_failure(&self, error: &AuthError) {
        self.failures
            .lock()
            .expect("observer lock poisoned")
            .push(error.clone());
    }
}

/// Replies with each template in turn, repeating the last one.
pub struct Sequence {
    responses: Mutex<VecDeque<ResponseTemplate>>,
}

impl Sequence {
    pub fn new(responses: impl IntoIterator<Item = ResponseTemplate>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let mut responses = self.responses.lock().expect("sequence lock poisoned");
        if responses.len() > 1 {
            responses.pop_front().expect("non-empty sequence")
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or_else(|| ResponseTemplate::new(500))
        }
    }
}

pub fn record(access_token: &str, expires_at: DateTime<Utc>) -> TokenRecord {
    TokenRecord {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        token_type: "Bearer".to_string(),
        expires_at,
        identity: None,
        environment: Environment::Staging,
    }
}
