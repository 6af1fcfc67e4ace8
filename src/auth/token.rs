use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use super::provider::{TokenResponse, UserInfo};
use crate::config::Environment;
use crate::time::add_secs;

/// A user session captured from the authorization provider.
///
/// `expires_at` is absolute and fixed when the record is built; nothing
/// downstream recomputes it from a relative TTL.
///
/// # Example
/// ```
/// use ads_auth::auth::TokenRecord;
/// use ads_auth::config::Environment;
/// use chrono::{Duration, Utc};
///
/// let record = TokenRecord {
///     access_token: "access".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     token_type: "Bearer".to_string(),
///     expires_at: Utc::now() + Duration::hours(1),
///     identity: None,
///     environment: Environment::Production,
/// };
/// assert!(record.has_access_token());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Option<Identity>,
    pub environment: Environment,
}

/// Principal cached alongside a session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Identity {
    #[serde(rename = "id")]
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

impl TokenRecord {
    /// Build a record from a token grant issued at `issued_at`.
    ///
    /// Expiry is truncated to whole milliseconds, the resolution the token
    /// file keeps, so a saved record loads back unchanged.
    pub fn from_response(
        response: &TokenResponse,
        environment: Environment,
        identity: Option<Identity>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            token_type: response
                .token_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            expires_at: add_secs(issued_at, response.expires_in_or_default()).trunc_subsecs(3),
            identity,
            environment,
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    pub fn email(&self) -> Option<&str> {
        self.identity.as_ref().and_then(|i| i.email.as_deref())
    }
}

impl From<UserInfo> for Identity {
    fn from(info: UserInfo) -> Self {
        Self {
            subject_id: info.id,
            email: info.email.filter(|e| !e.is_empty()),
            display_name: info.name.filter(|n| !n.is_empty()),
        }
    }
}
