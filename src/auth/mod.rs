//! Credential and token lifecycle: device login, token storage and refresh,
//! service tokens, and bearer verification.

pub mod device_code;
pub mod error;
pub mod expiry;
pub mod provider;
pub mod refresh;
pub mod service;
pub mod service_token;
pub mod store;
pub mod token;
pub mod verifier;

pub use device_code::{
    DeviceAuthClient, DeviceFlowEvent, DeviceFlowObserver, DeviceFlowState, DeviceSession,
};
pub use error::AuthError;
pub use expiry::{is_expired, is_expired_with_margin, DEFAULT_EXPIRY_MARGIN};
pub use provider::{PollResponse, ProviderClient, TokenResponse};
pub use refresh::RefreshFlow;
pub use service::{AuthService, AuthStatus, LoginOutcome};
pub use service_token::{HealthStatus, ServiceCredentials, ServiceTokenCache};
pub use store::{FileTokenStore, StorageError, TokenStore};
pub use token::{Identity, TokenRecord};
pub use verifier::{authorize_request, BearerVerifier, Rejection, Verification, VerifiedIdentity};
