mod support;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use lms_admin_gate::{AppConfig, MockTokenRefresher, config::Env, create_router};
use std::sync::Arc;
use support::{
    access_token, app_state, now, refresh_token, refresh_token_signed_with, spawn_upstream,
};
use tower::ServiceExt;

const HOUR: i64 = 3600;

struct TestApp {
    router: Router,
    refresher: Arc<MockTokenRefresher>,
}

async fn spawn_app_with(config: AppConfig, refresher: MockTokenRefresher) -> TestApp {
    let upstream = spawn_upstream().await;
    let refresher = Arc::new(refresher);
    let router = create_router(app_state(config, refresher.clone(), &upstream));
    TestApp { router, refresher }
}

async fn spawn_app(refresher: MockTokenRefresher) -> TestApp {
    spawn_app_with(AppConfig::default(), refresher).await
}

fn get(path: &str, cookie: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn cookies(access: &str, refresh: &str) -> Option<String> {
    Some(format!("accessToken={access}; refreshToken={refresh}"))
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(MockTokenRefresher::failing()).await;

    let response = app.router.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_anonymous_dashboard_visit_redirects_to_login() {
    let app = spawn_app(MockTokenRefresher::failing()).await;

    let response = app
        .router
        .oneshot(get("/dashboard/courses", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login?redirectPath=/dashboard/courses");
}

#[tokio::test]
async fn test_admin_session_reaches_the_upstream_page() {
    let app = spawn_app(MockTokenRefresher::issuing("fresh")).await;
    let access = access_token(now() + HOUR);
    let refresh = refresh_token("ADMIN", now(), 7 * 24 * HOUR);

    let response = app
        .router
        .oneshot(get("/dashboard/courses", cookies(&access, &refresh)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());
    let body = body_text(response).await;
    assert!(body.starts_with("page /dashboard/courses"), "{body}");
    assert_eq!(app.refresher.calls(), 0);
}

#[tokio::test]
async fn test_expired_access_token_is_rotated_on_the_response() {
    let app = spawn_app(MockTokenRefresher::issuing("fresh-token")).await;
    let access = access_token(now() - 60);
    let refresh = refresh_token("ADMIN", now(), 7 * 24 * HOUR);

    let response = app
        .router
        .oneshot(get("/dashboard/quizzes", cookies(&access, &refresh)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set = set_cookies(&response);
    assert_eq!(set.len(), 1, "{set:?}");
    let cookie = &set[0];
    assert!(cookie.starts_with("accessToken=fresh-token"), "{cookie}");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(!cookie.contains("Secure"), "local cookies are not Secure");

    // The upstream render already saw the rotated token.
    let body = body_text(response).await;
    assert!(body.contains("accessToken=fresh-token"), "{body}");
    assert!(body.contains(&format!("refreshToken={refresh}")), "{body}");
    assert_eq!(app.refresher.calls(), 1);
}

#[tokio::test]
async fn test_rotated_cookie_is_secure_in_production() {
    let mut config = AppConfig::default();
    config.env = Env::Production;
    let app = spawn_app_with(config, MockTokenRefresher::issuing("fresh-token")).await;
    let refresh = refresh_token("ADMIN", now(), 7 * 24 * HOUR);

    let response = app
        .router
        .oneshot(get("/", Some(format!("refreshToken={refresh}"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set = set_cookies(&response);
    assert!(set[0].starts_with("accessToken=fresh-token"));
    assert!(set[0].contains("Secure"));
}

#[tokio::test]
async fn test_failed_refresh_redirects_to_login() {
    let app = spawn_app(MockTokenRefresher::failing()).await;
    let access = access_token(now() - 60);
    let refresh = refresh_token("ADMIN", now(), 7 * 24 * HOUR);

    let response = app
        .router
        .oneshot(get("/dashboard", cookies(&access, &refresh)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login?redirectPath=/dashboard");
    let set = set_cookies(&response);
    assert!(set.iter().any(|c| c.starts_with("accessToken=;")), "{set:?}");
    assert!(set.iter().any(|c| c.starts_with("refreshToken=;")), "{set:?}");
    assert_eq!(app.refresher.calls(), 1);
}

#[tokio::test]
async fn test_forged_admin_claim_cannot_reach_the_dashboard() {
    let app = spawn_app(MockTokenRefresher::failing()).await;
    let forged = refresh_token_signed_with("attacker", "ADMIN", now(), HOUR);

    let response = app
        .router
        .oneshot(get("/dashboard/students", Some(format!("refreshToken={forged}"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login?redirectPath=/dashboard/students");
    assert!(!body_text(response).await.contains("page /dashboard"));
}

#[tokio::test]
async fn test_rotation_keeps_other_cookies_encoded_for_upstream() {
    let app = spawn_app(MockTokenRefresher::issuing("fresh-token")).await;
    let refresh = refresh_token("ADMIN", now(), 7 * 24 * HOUR);

    let response = app
        .router
        .oneshot(get(
            "/dashboard",
            Some(format!("theme=dark%20mode; refreshToken={refresh}")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("theme=dark%20mode"), "{body}");
    assert!(body.contains("accessToken=fresh-token"), "{body}");
}

#[tokio::test]
async fn test_non_admin_is_sent_to_login_and_signed_out() {
    let app = spawn_app(MockTokenRefresher::issuing("fresh")).await;
    let access = access_token(now() + HOUR);
    let refresh = refresh_token("STUDENT", now(), 7 * 24 * HOUR);

    let response = app
        .router
        .oneshot(get("/dashboard/students", cookies(&access, &refresh)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");
    let set = set_cookies(&response);
    assert_eq!(set.len(), 2, "{set:?}");
    assert!(set.iter().any(|c| c.starts_with("accessToken=;") && c.contains("Max-Age=0")));
    assert!(set.iter().any(|c| c.starts_with("refreshToken=;") && c.contains("Max-Age=0")));
}

#[tokio::test]
async fn test_unguarded_paths_bypass_the_gate() {
    let app = spawn_app(MockTokenRefresher::issuing("fresh")).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/login", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.starts_with("page /login"));

    let response = app
        .router
        .oneshot(get("/_next/static/chunks/app.js", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.refresher.calls(), 0);
}

#[tokio::test]
async fn test_logout_clears_both_cookies() {
    let app = spawn_app(MockTokenRefresher::failing()).await;
    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .header(header::COOKIE, "accessToken=a; refreshToken=r")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");
    let set = set_cookies(&response);
    assert!(set.iter().any(|c| c.starts_with("accessToken=;")));
    assert!(set.iter().any(|c| c.starts_with("refreshToken=;")));
}

#[tokio::test]
async fn test_session_endpoint_reports_the_current_user() {
    let app = spawn_app(MockTokenRefresher::failing()).await;
    let refresh = refresh_token("ADMIN", now(), HOUR);

    let response = app
        .router
        .clone()
        .oneshot(get("/session/me", Some(format!("refreshToken={refresh}"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(user["role"], "ADMIN");
    assert_eq!(user["email"], "admin@lms.test");

    let response = app.router.oneshot(get("/session/me", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unreachable_upstream_is_a_bad_gateway() {
    let refresher = Arc::new(MockTokenRefresher::failing());
    let router = create_router(app_state(
        AppConfig::default(),
        refresher,
        "http://127.0.0.1:1",
    ));

    let response = router.oneshot(get("/favicon.ico", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
