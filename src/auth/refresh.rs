use std::sync::Arc;

use tracing::{info, warn};

use super::error::AuthError;
use super::provider::ProviderClient;
use super::store::TokenStore;
use super::token::TokenRecord;
use crate::time::{Clock, SystemClock};

/// Exchanges a stored refresh token for a new session and persists it.
///
/// A missing or rejected refresh token comes back as
/// [`AuthError::LoginRequired`]. Nothing is retried.
pub struct RefreshFlow {
    provider: ProviderClient,
    client_id: String,
    client_secret: Option<String>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl RefreshFlow {
    pub fn new(
        provider: ProviderClient,
        client_id: impl Into<String>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            provider,
            client_id: client_id.into(),
            client_secret: None,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, AuthError> {
        let Some(refresh_token) = record.refresh_token.as_deref().filter(|t| !t.is_empty())
        else {
            return Err(AuthError::LoginRequired(
                "no refresh token stored".to_string(),
            ));
        };

        let issued_at = self.clock.now();
        let response = self
            .provider
            .refresh(refresh_token, &self.client_id, self.client_secret.as_deref())
            .await
            .map_err(|err| {
                warn!(error = %err, "token refresh failed");
                AuthError::LoginRequired(err.to_string())
            })?;

        let mut refreshed = TokenRecord::from_response(
            &response,
            record.environment,
            record.identity.clone(),
            issued_at,
        );
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = record.refresh_token.clone();
        }
        self.store.save(&refreshed)?;
        info!(expires_at = %refreshed.expires_at, "session refreshed");
        Ok(refreshed)
    }
}
