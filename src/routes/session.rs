use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Session Router Module
///
/// Lets the admin UI read the identity carried by its refresh-token cookie.
pub fn session_routes() -> Router<AppState> {
    // GET /session/me
    Router::new().route("/session/me", get(handlers::get_session))
}
