#![allow(clippy::unwrap_used)]
// Integration tests for `AuthSession` and `DeviceRegistry` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weback_api::{AuthSession, Credentials, DeviceRegistry, Error, Session};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, AuthSession) {
    let server = MockServer::start().await;
    let auth_url = Url::parse(&format!("{}/prod/oauth", server.uri())).unwrap();
    let credentials = Credentials::new(
        "user@example.com",
        SecretString::from("hunter2".to_string()),
        "+34",
    );
    let auth = AuthSession::with_client(reqwest::Client::new(), credentials, auth_url);
    (server, auth)
}

fn login_ok(server: &MockServer) -> serde_json::Value {
    json!({
        "msg": "success",
        "data": {
            "jwt_token": "jwt-abc",
            "region_name": "eu-central-1",
            "wss_url": "wss://stream.example.com/ws",
            "api_url": format!("{}/prod/api", server.uri())
        }
    })
}

fn session_for(server: &MockServer) -> Session {
    Session {
        token: SecretString::from("jwt-abc".to_string()),
        region_name: "eu-central-1".into(),
        api_url: Url::parse(&format!("{}/prod/api", server.uri())).unwrap(),
        stream_url: Url::parse("wss://stream.example.com/ws").unwrap(),
    }
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/oauth"))
        .and(body_partial_json(json!({
            "payload": {"opt": "login", "pwd": "2ab96390c7dbe3439de74d0c9b0b1767"},
            "header": {"calling_code": "0034", "account": "user@example.com"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok(&server)))
        .expect(1)
        .mount(&server)
        .await;

    let session = auth.login().await.unwrap();
    assert_eq!(session.token.expose_secret(), "jwt-abc");
    assert_eq!(session.region_name, "eu-central-1");
    assert_eq!(session.stream_url.as_str(), "wss://stream.example.com/ws");
    assert!(auth.session().is_some());
}

#[tokio::test]
async fn test_login_rejected_message() {
    let (server, auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/oauth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "fail", "data": null})))
        .mount(&server)
        .await;

    let result = auth.login().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(auth.session().is_none());
}

#[tokio::test]
async fn test_login_http_error() {
    let (server, auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/oauth"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let result = auth.login().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_unreachable_is_authentication_error() {
    let credentials = Credentials::new("u", SecretString::from("p".to_string()), "1");
    // Port 9 (discard) on localhost is not listening
    let auth = AuthSession::with_client(
        reqwest::Client::new(),
        credentials,
        Url::parse("http://127.0.0.1:9/prod/oauth").unwrap(),
    );

    let result = auth.login().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_reauthenticate_replaces_session() {
    let (server, auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/oauth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok(&server)))
        .expect(2)
        .mount(&server)
        .await;

    auth.login().await.unwrap();
    auth.invalidate();
    assert!(auth.session().is_none());

    let session = auth.reauthenticate().await.unwrap();
    assert_eq!(session.region_name, "eu-central-1");
    assert!(auth.session().is_some());
}

// ── Device list ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_in_server_order() {
    let (server, _auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/api"))
        .and(header("Token", "jwt-abc"))
        .and(header("Region", "eu-central-1"))
        .and(body_partial_json(json!({"opt": "user_thing_list_get"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "msg": "success",
            "data": {"thing_list": [
                {"thing_name": "robot-b", "thing_nickname": "Upstairs", "sub_type": "vacuum",
                 "thing_status": {"working_status": "Charging", "battery_level": 100}},
                {"thing_name": "robot-a", "thing_nickname": "", "sub_type": "vacuum",
                 "thing_status": {}}
            ]}
        })))
        .mount(&server)
        .await;

    let registry = DeviceRegistry::new(reqwest::Client::new());
    let devices = registry.list(&session_for(&server)).await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].thing_name, "robot-b");
    assert_eq!(devices[0].display_name(), "Upstairs");
    assert_eq!(devices[0].thing_status["working_status"], "Charging");
    assert_eq!(devices[1].display_name(), "robot-a");
}

#[tokio::test]
async fn test_list_devices_empty_account() {
    let (server, _auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/api"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"msg": "success", "data": {"thing_list": []}})),
        )
        .mount(&server)
        .await;

    let registry = DeviceRegistry::new(reqwest::Client::new());
    let devices = registry.list(&session_for(&server)).await.unwrap();
    assert!(devices.is_empty());
}

#[tokio::test]
async fn test_list_devices_rejected() {
    let (server, _auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "fail"})))
        .mount(&server)
        .await;

    let registry = DeviceRegistry::new(reqwest::Client::new());
    let result = registry.list(&session_for(&server)).await;
    assert!(
        matches!(result, Err(Error::Api { .. })),
        "expected Api error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_list_devices_expired_token() {
    let (server, _auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/api"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let registry = DeviceRegistry::new(reqwest::Client::new());
    let result = registry.list(&session_for(&server)).await;
    assert!(matches!(result, Err(Error::SessionExpired)));
}

#[tokio::test]
async fn test_list_devices_garbage_body() {
    let (server, _auth) = setup().await;

    Mock::given(method("POST"))
        .and(path("/prod/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let registry = DeviceRegistry::new(reqwest::Client::new());
    let result = registry.list(&session_for(&server)).await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}
