//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthError, AuthService, BearerVerifier, DeviceFlowObserver, FileTokenStore, ServiceTokenCache,
    TokenRecord, TokenStore, Verification,
};
pub use crate::config::{CliConfig, Environment, ServiceConfig};
pub use crate::time::{Clock, SystemClock};
