mod auth_support;

use std::sync::Arc;
use std::time::Duration;

use ads_auth::auth::{AuthError, Identity, ProviderClient, RefreshFlow};
use ads_auth::config::Environment;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::{clock, record, t0, InMemoryTokenStore, ReadOnlyTokenStore};

fn flow(server: &MockServer, store: Arc<InMemoryTokenStore>) -> RefreshFlow {
    let provider = ProviderClient::new(server.uri(), Duration::from_secs(5)).expect("client");
    RefreshFlow::new(provider, "google-ads-cli-stage", store).with_clock(clock())
}

#[tokio::test]
async fn refresh_keeps_old_refresh_token_when_omitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .and(body_string_contains("client_id=google-ads-cli-stage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryTokenStore::new());
    let mut stale = record("access-1", t0() - chrono::Duration::minutes(1));
    stale.identity = Some(Identity {
        subject_id: "u1".to_string(),
        email: Some("ada@example.com".to_string()),
        display_name: None,
    });

    let refreshed = flow(&server, store.clone())
        .refresh(&stale)
        .await
        .expect("refresh");

    assert_eq!(refreshed.access_token, "access-2");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(refreshed.expires_at, t0() + chrono::Duration::seconds(1800));
    assert_eq!(refreshed.environment, Environment::Staging);
    assert_eq!(refreshed.identity, stale.identity);
    assert_eq!(store.get(), Some(refreshed));
}

#[tokio::test]
async fn refresh_adopts_rotated_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
            "expires_in": 1800
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryTokenStore::new());
    let refreshed = flow(&server, store)
        .refresh(&record("access-1", t0()))
        .await
        .expect("refresh");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn rejected_refresh_requires_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryTokenStore::new());
    let stale = record("access-1", t0());
    store.seed(stale.clone());

    let err = flow(&server, store.clone())
        .refresh(&stale)
        .await
        .expect_err("refresh fails");

    assert!(matches!(err, AuthError::LoginRequired(ref m) if m.contains("invalid_grant")));
    assert_eq!(store.get(), Some(stale));
}

#[tokio::test]
async fn missing_refresh_token_requires_login_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut stale = record("access-1", t0());
    stale.refresh_token = None;

    let err = flow(&server, Arc::new(InMemoryTokenStore::new()))
        .refresh(&stale)
        .await
        .expect_err("refresh fails");
    assert!(matches!(err, AuthError::LoginRequired(_)));
}

#[tokio::test]
async fn unwritable_store_is_storage_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 1800
        })))
        .mount(&server)
        .await;

    let provider = ProviderClient::new(server.uri(), Duration::from_secs(5)).expect("client");
    let flow = RefreshFlow::new(provider, "cli", Arc::new(ReadOnlyTokenStore)).with_clock(clock());

    let err = flow
        .refresh(&record("access-1", t0()))
        .await
        .expect_err("save fails");
    assert!(matches!(err, AuthError::StorageUnavailable(_)));
}
