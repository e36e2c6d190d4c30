// HTTP client tests against an in-process mock gateway.
//
// Covers: request shapes and auth headers per endpoint, error payload
// mapping, timeouts, unreachable servers, and the GatewayApi conversion.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use gateway_link_client::{ClientError, ClientOptions, GatewayClient, HttpGateway};
use gateway_link_core::{ExecutionContext, GatewayApi, GatewayApiError, GatewayConfig};

// ── Mock gateway ────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

impl Recorded {
    fn push(&self, path: &str, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        self.requests.lock().unwrap().push((path.to_string(), auth, body));
    }

    fn all(&self) -> Vec<(String, Option<String>, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Token is invalid or expired"})),
    )
        .into_response()
}

async fn login(State(rec): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    rec.push("login", &headers, body.clone());
    if bearer(&headers) != Some("svc") {
        return unauthorized();
    }
    if body["access_token"] == "bad" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"code": "INVALID_TOKEN", "message": "upstream token rejected"}})),
        )
            .into_response();
    }
    Json(json!({
        "access_token": "gw-a",
        "refresh_token": "gw-r",
        "expires_in": 3600,
        "refresh_token_expires_in": 86400,
        "user": {"id": 42}
    }))
    .into_response()
}

async fn refresh(State(rec): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    rec.push("refresh", &headers, body.clone());
    if body["refresh_token"] != "gw-r" {
        return unauthorized();
    }
    Json(json!({
        "access_token": "gw-a2",
        "refresh_token": "gw-r2",
        "expires_in": 1800,
        "refresh_token_expires_in": 86400
    }))
    .into_response()
}

async fn me(State(rec): State<Recorded>, headers: HeaderMap) -> Response {
    rec.push("me", &headers, Value::Null);
    match bearer(&headers) {
        Some("gw-a") => Json(json!({"user": {"id": 42, "username": "amy"}})).into_response(),
        Some("garbage") => (StatusCode::OK, "not json").into_response(),
        _ => unauthorized(),
    }
}

async fn logout(State(rec): State<Recorded>, headers: HeaderMap) -> Response {
    rec.push("logout", &headers, Value::Null);
    match bearer(&headers) {
        Some("gw-a") => StatusCode::OK.into_response(),
        Some("down") => (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response(),
        _ => unauthorized(),
    }
}

async fn spawn_gateway() -> (SocketAddr, Recorded) {
    let rec = Recorded::default();
    let router = Router::new()
        .route("/api/account/auths/login/", post(login))
        .route("/api/account/auths/refresh/", post(refresh))
        .route("/api/account/auths/logout/", post(logout))
        .route("/api/account/users/me/", get(me))
        .with_state(rec.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    (addr, rec)
}

fn config_for(addr: SocketAddr) -> GatewayConfig {
    GatewayConfig {
        service_token: "svc".into(),
        server_url: format!("http://{addr}"),
        public_url: format!("http://{addr}"),
        timeout_secs: 5,
    }
}

// ── Service-level endpoints ─────────────────────────────────────

#[tokio::test]
async fn login_sends_service_token_and_body() {
    let (addr, rec) = spawn_gateway().await;
    let client = GatewayClient::service(&config_for(addr));

    let grant = client.login("fortytwo", "tok-up").await.unwrap();
    assert_eq!(grant.access_token, "gw-a");
    assert_eq!(grant.refresh_token, "gw-r");
    assert_eq!(grant.expires_in, 3600);
    assert_eq!(grant.user.map(|u| u.id).as_deref(), Some("42"));

    let requests = rec.all();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1.as_deref(), Some("Bearer svc"));
    assert_eq!(requests[0].2, json!({"provider": "fortytwo", "access_token": "tok-up"}));
}

#[tokio::test]
async fn login_rejection_maps_nested_error() {
    let (addr, _) = spawn_gateway().await;
    let client = GatewayClient::service(&config_for(addr));

    let err = client.login("fortytwo", "bad").await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.code(), Some("INVALID_TOKEN"));
    assert_eq!(err.message(), "upstream token rejected");
}

#[tokio::test]
async fn wrong_service_token_is_unauthorized() {
    let (addr, _) = spawn_gateway().await;
    let mut config = config_for(addr);
    config.service_token = "wrong".into();

    let err = GatewayClient::service(&config).login("fortytwo", "tok-up").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.message(), "Token is invalid or expired");
}

#[tokio::test]
async fn refresh_exchanges_refresh_token() {
    let (addr, rec) = spawn_gateway().await;
    let client = GatewayClient::service(&config_for(addr));

    let grant = client.refresh("gw-r").await.unwrap();
    assert_eq!(grant.access_token, "gw-a2");
    assert!(grant.user.is_none());
    assert_eq!(rec.all()[0].2, json!({"refresh_token": "gw-r"}));

    assert!(client.refresh("stale").await.unwrap_err().is_unauthorized());
}

// ── User-level endpoints ────────────────────────────────────────

#[tokio::test]
async fn me_uses_user_bearer() {
    let (addr, rec) = spawn_gateway().await;
    let me = GatewayClient::user(&config_for(addr), "gw-a", ExecutionContext::Server)
        .me()
        .await
        .unwrap();
    assert_eq!(me.user.id, "42");
    assert_eq!(me.user.extra["username"], "amy");
    assert_eq!(rec.all()[0].1.as_deref(), Some("Bearer gw-a"));
}

#[tokio::test]
async fn me_with_malformed_body_is_deserialization_error() {
    let (addr, _) = spawn_gateway().await;
    let err = GatewayClient::user(&config_for(addr), "garbage", ExecutionContext::Server)
        .me()
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Deserialization(_)));
}

#[tokio::test]
async fn logout_accepts_empty_success() {
    let (addr, _) = spawn_gateway().await;
    let config = config_for(addr);
    GatewayClient::user(&config, "gw-a", ExecutionContext::Server)
        .logout()
        .await
        .unwrap();

    let err = GatewayClient::user(&config, "down", ExecutionContext::Server)
        .logout()
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Server { status: 503, message: "maintenance".into() });
}

// ── Transport failures ──────────────────────────────────────────

#[tokio::test]
async fn unreachable_gateway_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = GatewayClient::service(&config_for(addr))
        .login("fortytwo", "tok-up")
        .await
        .unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let router = Router::new().route(
        "/api/account/auths/login/",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let client = GatewayClient::new(ClientOptions {
        base_url: format!("http://{addr}"),
        bearer_token: Some("svc".into()),
        timeout_secs: 1,
    });
    let err = client.login("fortytwo", "tok-up").await.unwrap_err();
    assert_eq!(err, ClientError::Timeout);
}

// ── GatewayApi implementation ───────────────────────────────────

#[tokio::test]
async fn http_gateway_full_flow() {
    let (addr, rec) = spawn_gateway().await;
    let gateway = HttpGateway::new(&config_for(addr));

    let grant = gateway.login("fortytwo", "tok-up").await.unwrap();
    let user = gateway.who_am_i(&grant.access_token).await.unwrap();
    assert_eq!(user.id, "42");
    gateway.logout(&grant.access_token).await.unwrap();

    let auth: Vec<Option<String>> = rec.all().into_iter().map(|(_, a, _)| a).collect();
    assert_eq!(
        auth,
        vec![
            Some("Bearer svc".to_string()),
            Some("Bearer gw-a".to_string()),
            Some("Bearer gw-a".to_string()),
        ]
    );
}

#[tokio::test]
async fn http_gateway_errors_convert() {
    let (addr, _) = spawn_gateway().await;
    let gateway = HttpGateway::new(&config_for(addr));

    let err = gateway.who_am_i("expired").await.unwrap_err();
    assert!(err.is_unauthorized());

    let err = gateway.who_am_i("garbage").await.unwrap_err();
    assert!(matches!(err, GatewayApiError::Decode(_)));
}
