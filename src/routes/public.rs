use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints outside the guarded route set. They are never subject to the session gate.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Returns "ok" immediately for monitoring and load balancer checks.
        .route("/health", get(handlers::health))
        // GET|POST /logout
        // Clears the accessToken and refreshToken cookies, then redirects to /login.
        .route("/logout", post(handlers::logout).get(handlers::logout))
}
