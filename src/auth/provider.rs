//! Wire contracts of the authorization provider.
//!
//! Every route lives under `{auth_url}/api/v1`. The client carries a finite
//! request timeout so a hung provider cannot stall its caller.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::AuthError;

pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// HTTP client for one authorization server.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    auth_url: String,
}

impl ProviderClient {
    pub fn new(auth_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| AuthError::Configuration(format!("HTTP client: {err}")))?;
        Ok(Self {
            client,
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}/api/v1{route}", self.auth_url)
    }

    /// `POST /oauth/device/authorize`.
    pub async fn request_device_code(
        &self,
        client_id: &str,
    ) -> Result<DeviceCodeResponse, AuthError> {
        let resp = self
            .client
            .post(self.url("/oauth/device/authorize"))
            .json(&serde_json::json!({ "client_id": client_id }))
            .send()
            .await?;
        let resp = ensure_success(resp, "device code request").await?;
        resp.json()
            .await
            .map_err(|err| AuthError::InvalidResponse(format!("device code response: {err}")))
    }

    /// `POST /oauth/device/token`; the body is classified whatever the status.
    pub async fn poll_device_token(
        &self,
        client_id: &str,
        device_code: &str,
    ) -> Result<PollResponse, AuthError> {
        let resp = self
            .client
            .post(self.url("/oauth/device/token"))
            .form(&[
                ("device_code", device_code),
                ("client_id", client_id),
                ("grant_type", DEVICE_CODE_GRANT),
            ])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Ok(PollResponse::classify(status, &body))
    }

    /// `POST /oauth/token` with `grant_type=client_credentials`.
    pub async fn client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<TokenResponse, AuthError> {
        let resp = self
            .client
            .post(self.url("/oauth/token"))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("scope", scope),
            ])
            .send()
            .await?;
        let resp = ensure_success(resp, "client credentials exchange").await?;
        parse_token_response(resp).await
    }

    /// `POST /oauth/token` with `grant_type=refresh_token`.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ];
        if let Some(secret) = client_secret {
            form.push(("client_secret", secret));
        }
        let resp = self
            .client
            .post(self.url("/oauth/token"))
            .form(&form)
            .send()
            .await?;
        let resp = ensure_success(resp, "token refresh").await?;
        parse_token_response(resp).await
    }

    /// `GET /users/me` with the user's own bearer.
    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let resp = self
            .client
            .get(self.url("/users/me"))
            .bearer_auth(access_token)
            .send()
            .await?;
        let resp = ensure_success(resp, "user info request").await?;
        resp.json()
            .await
            .map_err(|err| AuthError::InvalidResponse(format!("user info response: {err}")))
    }

    /// `POST /auth/verify` authorized with a service bearer.
    pub async fn verify(
        &self,
        service_token: &str,
        candidate: &str,
    ) -> Result<VerifyResponse, AuthError> {
        let resp = self
            .client
            .post(self.url("/auth/verify"))
            .bearer_auth(service_token)
            .json(&VerifyRequest { token: candidate })
            .send()
            .await?;
        let resp = ensure_success(resp, "token verification").await?;
        resp.json()
            .await
            .map_err(|err| AuthError::InvalidResponse(format!("verify response: {err}")))
    }
}

async fn ensure_success(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AuthError::ProviderUnavailable(format!(
        "{what} failed with status {}: {}",
        status.as_u16(),
        body.trim()
    )))
}

async fn parse_token_response(resp: reqwest::Response) -> Result<TokenResponse, AuthError> {
    let token: TokenResponse = resp
        .json()
        .await
        .map_err(|err| AuthError::InvalidResponse(format!("token response: {err}")))?;
    if token.access_token.is_empty() {
        return Err(AuthError::InvalidResponse(
            "token response has an empty access_token".to_string(),
        ));
    }
    Ok(token)
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: u64,
}

impl DeviceCodeResponse {
    /// Server interval, or 5 seconds when the server sends none.
    pub fn poll_interval(&self) -> Duration {
        if self.interval == 0 {
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        } else {
            Duration::from_secs(self.interval)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_secs")]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    pub fn expires_in_or_default(&self) -> u64 {
        self.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One answer from the device token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResponse {
    Token(TokenResponse),
    Pending,
    SlowDown,
    ExpiredToken,
    AccessDenied,
    /// Any other provider error, with its description when given.
    Error(String),
    /// Body was not JSON or had neither a token nor an error.
    Unparseable(String),
}

/// A TTL sent as an integer, a float or a numeric string. Anything else
/// reads as absent so the caller's default applies.
fn lenient_secs<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let secs = match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().and_then(whole_secs)),
        Some(serde_json::Value::String(text)) => text.trim().parse::<f64>().ok().and_then(whole_secs),
        _ => None,
    };
    Ok(secs)
}

fn whole_secs(secs: f64) -> Option<u64> {
    (secs.is_finite() && secs >= 0.0).then(|| secs as u64)
}

#[derive(Debug, Deserialize)]
struct DeviceTokenBody {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_secs")]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl PollResponse {
    /// Map a token endpoint body to a poll outcome. Error codes are case-sensitive.
    pub fn classify(status: StatusCode, body: &str) -> Self {
        let parsed: DeviceTokenBody = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                let raw = body.trim();
                return Self::Unparseable(if raw.is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    raw.to_string()
                });
            }
        };
        match (parsed.access_token, parsed.error) {
            (Some(access_token), None) if !access_token.is_empty() => Self::Token(TokenResponse {
                access_token,
                refresh_token: parsed.refresh_token,
                token_type: parsed.token_type,
                expires_in: parsed.expires_in,
            }),
            (_, Some(code)) => match code.as_str() {
                "authorization_pending" => Self::Pending,
                "slow_down" => Self::SlowDown,
                "expired_token" => Self::ExpiredToken,
                "access_denied" => Self::AccessDenied,
                _ => Self::Error(
                    parsed
                        .error_description
                        .filter(|d| !d.is_empty())
                        .unwrap_or(code),
                ),
            },
            _ => Self::Unparseable(format!("HTTP {}: {}", status.as_u16(), body.trim())),
        }
    }
}
