use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    auth,
    config::AppConfig,
    gate::{self, REFRESH_TOKEN_COOKIE},
    models::{CurrentUser, ErrorResponse},
    policy::LOGIN_PATH,
};

/// health
///
/// [Public Route] Liveness check for load balancers. Never gated.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// logout
///
/// [Public Route] Clears both session cookies and sends the browser to the login page.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 307, description = "Cookies cleared, redirect to /login"))
)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    tracing::info!("session cleared by logout");
    (gate::clear_session(jar), Redirect::temporary(LOGIN_PATH))
}

/// get_session
///
/// [Session Route] Returns the user decoded from the refresh-token cookie, the same
/// identity the gate authorizes against.
#[utoipa::path(
    get,
    path = "/session/me",
    responses(
        (status = 200, description = "Signed-in user", body = CurrentUser),
        (status = 401, description = "No valid session", body = ErrorResponse)
    )
)]
pub async fn get_session(
    State(config): State<AppConfig>,
    jar: CookieJar,
) -> Result<Json<CurrentUser>, (StatusCode, Json<ErrorResponse>)> {
    let refresh_token = jar.get(REFRESH_TOKEN_COOKIE).map(|cookie| cookie.value());
    auth::current_user(refresh_token, config.refresh_token_secret.as_deref())
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::fail("You are not logged in")),
            )
        })
}
