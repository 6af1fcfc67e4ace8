use thiserror::Error;

use super::store::StorageError;

/// Authentication and token lifecycle errors.
///
/// Payloads are plain strings so one outcome can be handed to every caller
/// waiting on a coalesced exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Authorization provider rejected the request: {0}")]
    ProviderRejected(String),
    #[error("Authorization denied by the user")]
    AuthorizationDenied,
    #[error("Device code expired before authorization completed")]
    AuthorizationExpired,
    #[error("Timed out waiting for authorization")]
    AuthorizationTimeout,
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),
    #[error("Token storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Login cancelled")]
    Cancelled,
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Session expired, please log in again: {0}")]
    LoginRequired(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Follow-up the user should take, if there is an obvious one.
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotLoggedIn | Self::LoginRequired(_) | Self::InvalidCredential(_) => {
                Some("run `ads-auth auth login` to sign in")
            }
            Self::AuthorizationExpired | Self::AuthorizationTimeout => {
                Some("start the login again and enter the code sooner")
            }
            Self::ProviderUnavailable(_) => Some("check your network and try again"),
            Self::Configuration(_) => Some("check OPTIMA_ENV and related environment variables"),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::ProviderUnavailable(error.to_string())
    }
}

impl From<StorageError> for AuthError {
    fn from(error: StorageError) -> Self {
        Self::StorageUnavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_become_storage_unavailable() {
        let err: AuthError = StorageError::Corrupt("expected value at line 1".into()).into();
        assert!(matches!(err, AuthError::StorageUnavailable(msg) if msg.contains("line 1")));
    }

    #[test]
    fn login_errors_point_at_login_command() {
        assert!(AuthError::NotLoggedIn
            .recovery_hint()
            .is_some_and(|hint| hint.contains("auth login")));
        assert!(AuthError::LoginRequired("refresh rejected".into())
            .recovery_hint()
            .is_some());
        assert_eq!(AuthError::Cancelled.recovery_hint(), None);
    }

    #[test]
    fn expired_and_timeout_render_differently() {
        assert_ne!(
            AuthError::AuthorizationExpired.to_string(),
            AuthError::AuthorizationTimeout.to_string()
        );
    }
}
