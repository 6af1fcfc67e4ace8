//! Verification of bearer tokens presented by inbound callers.

use std::sync::Arc;

use tracing::{debug, warn};

use super::provider::ProviderClient;
use super::service_token::ServiceTokenCache;

pub const EMPTY_TOKEN_REASON: &str = "empty";
const DEFAULT_INVALID_REASON: &str = "invalid token";

/// Principal attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub role: Option<String>,
    pub email: Option<String>,
}

/// Outcome of verifying a bearer token. Never an error: every failure is
/// an [`Verification::Invalid`] with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(VerifiedIdentity),
    Invalid { reason: String },
}

impl Verification {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Checks user tokens against the provider's verification endpoint,
/// authenticating itself with a cached service token.
pub struct BearerVerifier {
    provider: ProviderClient,
    service_tokens: Arc<ServiceTokenCache>,
}

impl BearerVerifier {
    pub fn new(provider: ProviderClient, service_tokens: Arc<ServiceTokenCache>) -> Self {
        Self {
            provider,
            service_tokens,
        }
    }

    pub async fn verify(&self, bearer_token: &str) -> Verification {
        let candidate = bearer_token.trim();
        if candidate.is_empty() {
            return Verification::invalid(EMPTY_TOKEN_REASON);
        }

        let service_token = match self.service_tokens.get_token(false).await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "token verification failed");
                return Verification::invalid(err.to_string());
            }
        };

        match self.provider.verify(&service_token, candidate).await {
            Ok(resp) if resp.valid => match resp.user_id.filter(|id| !id.is_empty()) {
                Some(subject_id) => {
                    debug!(user_id = %subject_id, "token verified");
                    Verification::Valid(VerifiedIdentity {
                        subject_id,
                        role: resp.role,
                        email: resp.email,
                    })
                }
                None => Verification::invalid("verification response missing user_id"),
            },
            Ok(resp) => Verification::invalid(
                resp.error
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| DEFAULT_INVALID_REASON.to_string()),
            ),
            Err(err) => {
                warn!(error = %err, "token verification failed");
                Verification::invalid(err.to_string())
            }
        }
    }
}

/// Why an inbound request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: u16,
    pub reason: String,
}

impl Rejection {
    fn unauthorized(reason: impl Into<String>) -> Self {
        Self {
            status: 401,
            reason: reason.into(),
        }
    }
}

/// Inbound request guard: authenticate an `Authorization` header value.
pub async fn authorize_request(
    verifier: &BearerVerifier,
    authorization: Option<&str>,
) -> Result<VerifiedIdentity, Rejection> {
    let token = authorization.and_then(bearer_from_header).unwrap_or_default();
    match verifier.verify(token).await {
        Verification::Valid(identity) => Ok(identity),
        Verification::Invalid { reason } => Err(Rejection::unauthorized(reason)),
    }
}

/// Extract the credential from `Bearer <token>`; the scheme is case-insensitive.
pub fn bearer_from_header(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}
