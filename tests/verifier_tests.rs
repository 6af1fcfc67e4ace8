mod auth_support;

use std::sync::Arc;
use std::time::Duration;

use ads_auth::auth::verifier::EMPTY_TOKEN_REASON;
use ads_auth::auth::{
    authorize_request, BearerVerifier, ProviderClient, Rejection, ServiceCredentials,
    ServiceTokenCache, Verification, VerifiedIdentity,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_support::clock;

const VERIFY_PATH: &str = "/api/v1/auth/verify";

fn verifier(server: &MockServer) -> BearerVerifier {
    let provider = ProviderClient::new(server.uri(), Duration::from_secs(5)).expect("client");
    let cache = ServiceTokenCache::new(
        provider.clone(),
        ServiceCredentials {
            client_id: "ads-backend".to_string(),
            client_secret: "s3cret".to_string(),
            scope: "api:internal".to_string(),
        },
    )
    .with_clock(clock());
    BearerVerifier::new(provider, Arc::new(cache))
}

async fn mount_service_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "svc-1",
            "expires_in": 900
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn empty_token_is_rejected_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let verifier = verifier(&server);
    for candidate in ["", "   "] {
        assert_eq!(
            verifier.verify(candidate).await,
            Verification::Invalid {
                reason: EMPTY_TOKEN_REASON.to_string()
            }
        );
    }
}

#[tokio::test]
async fn valid_response_maps_to_identity() {
    let server = MockServer::start().await;
    mount_service_token(&server).await;
    Mock::given(method("POST"))
        .and(path(VERIFY_PATH))
        .and(header("authorization", "Bearer svc-1"))
        .and(body_json(json!({ "token": "user-token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "user_id": "u1",
            "role": "admin",
            "email": "ada@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = verifier(&server).verify("user-token").await;

    assert_eq!(
        outcome,
        Verification::Valid(VerifiedIdentity {
            subject_id: "u1".to_string(),
            role: Some("admin".to_string()),
            email: Some("ada@example.com".to_string()),
        })
    );
}

#[tokio::test]
async fn remote_rejection_reason_is_passed_through() {
    let server = MockServer::start().await;
    mount_service_token(&server).await;
    Mock::given(method("POST"))
        .and(path(VERIFY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": false,
            "error": "token revoked"
        })))
        .mount(&server)
        .await;

    assert_eq!(
        verifier(&server).verify("user-token").await,
        Verification::Invalid {
            reason: "token revoked".to_string()
        }
    );
}

#[tokio::test]
async fn remote_rejection_without_reason_uses_default() {
    let server = MockServer::start().await;
    mount_service_token(&server).await;
    Mock::given(method("POST"))
        .and(path(VERIFY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": false })))
        .mount(&server)
        .await;

    assert_eq!(
        verifier(&server).verify("user-token").await,
        Verification::Invalid {
            reason: "invalid token".to_string()
        }
    );
}

#[tokio::test]
async fn valid_without_user_id_is_rejected() {
    let server = MockServer::start().await;
    mount_service_token(&server).await;
    Mock::given(method("POST"))
        .and(path(VERIFY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": true })))
        .mount(&server)
        .await;

    assert!(!verifier(&server).verify("user-token").await.is_valid());
}

#[tokio::test]
async fn verification_endpoint_failure_is_invalid_not_error() {
    let server = MockServer::start().await;
    mount_service_token(&server).await;
    Mock::given(method("POST"))
        .and(path(VERIFY_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&server)
        .await;

    match verifier(&server).verify("user-token").await {
        Verification::Invalid { reason } => assert!(reason.contains("502"), "{reason}"),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[tokio::test]
async fn service_token_failure_is_invalid_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(VERIFY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = verifier(&server).verify("user-token").await;
    assert!(!outcome.is_valid());
}

#[tokio::test]
async fn authorize_request_rejects_with_401() {
    let server = MockServer::start().await;
    let verifier = verifier(&server);

    assert_eq!(
        authorize_request(&verifier, None).await,
        Err(Rejection {
            status: 401,
            reason: EMPTY_TOKEN_REASON.to_string()
        })
    );
    assert_eq!(
        authorize_request(&verifier, Some("Basic abc")).await,
        Err(Rejection {
            status: 401,
            reason: EMPTY_TOKEN_REASON.to_string()
        })
    );
}

#[tokio::test]
async fn authorize_request_accepts_bearer_header() {
    let server = MockServer::start().await;
    mount_service_token(&server).await;
    Mock::given(method("POST"))
        .and(path(VERIFY_PATH))
        .and(body_json(json!({ "token": "user-token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "user_id": "u1"
        })))
        .mount(&server)
        .await;

    let identity = authorize_request(&verifier(&server), Some("Bearer user-token"))
        .await
        .expect("authorized");
    assert_eq!(identity.subject_id, "u1");
}
