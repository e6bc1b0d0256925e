use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tagsync_core::{AuthClient, AuthError};

#[tokio::test]
async fn refresh_session_exchanges_refresh_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-2",
            "expires_in": 3600,
            "refresh_token": "refresh-2"
        })))
        .mount(&server)
        .await;

    let client = AuthClient::new(&server.uri()).unwrap();
    let session = client.refresh_session("refresh-1").await.unwrap();

    assert_eq!(session.access_token, "token-2");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn refresh_session_keeps_old_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-2"
        })))
        .mount(&server)
        .await;

    let client = AuthClient::new(&server.uri()).unwrap();
    let session = client.refresh_session("refresh-1").await.unwrap();

    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn refresh_session_surfaces_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let client = AuthClient::new(&server.uri()).unwrap();
    let err = client.refresh_session("refresh-1").await.unwrap_err();

    assert!(matches!(err, AuthError::Api { .. }));
}
