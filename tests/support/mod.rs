#![allow(dead_code)]

use axum::{
    Router,
    http::{HeaderMap, Uri, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use lms_admin_gate::{
    AppConfig, AppState, MockTokenRefresher, RefresherState, RoutePolicy, UpstreamProxy,
    auth::SessionClaims,
};
use std::sync::Arc;
use tokio::net::TcpListener;

pub const TEST_SECRET: &str = "test-refresh-secret-1234567890";
pub const NOW: i64 = 1_750_000_000;

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Refresh token carrying `role`, valid for `ttl` seconds from `issued_at`.
pub fn refresh_token(role: &str, issued_at: i64, ttl: i64) -> String {
    refresh_token_signed_with(TEST_SECRET, role, issued_at, ttl)
}

/// Same claims, signed with an arbitrary key.
pub fn refresh_token_signed_with(secret: &str, role: &str, issued_at: i64, ttl: i64) -> String {
    let claims = SessionClaims {
        id: "64f1c0ffee".to_string(),
        email: "admin@lms.test".to_string(),
        role: role.to_string(),
        iat: issued_at,
        exp: issued_at + ttl,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

/// Access token whose only interesting claim is its expiry.
pub fn access_token(exp: i64) -> String {
    let claims = serde_json::json!({ "id": "64f1c0ffee", "role": "ADMIN", "exp": exp });
    let key = EncodingKey::from_secret(b"the-gate-never-sees-this-secret");
    encode(&Header::default(), &claims, &key).unwrap()
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let address = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    address
}

/// Stand-in for the admin UI: echoes the path and the Cookie header it received.
pub async fn spawn_upstream() -> String {
    let app = Router::new().fallback(|uri: Uri, headers: HeaderMap| async move {
        let cookie = headers
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        format!("page {} cookie={}", uri.path(), cookie)
    });
    spawn(app).await
}

pub fn app_state(config: AppConfig, refresher: Arc<MockTokenRefresher>, upstream_url: &str) -> AppState {
    AppState {
        config,
        refresher: refresher as RefresherState,
        policy: Arc::new(RoutePolicy::standard()),
        upstream: Arc::new(UpstreamProxy::new(upstream_url).unwrap()),
    }
}
