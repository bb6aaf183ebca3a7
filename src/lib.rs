use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::{HeaderName, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod upstream;

pub mod routes;
use routes::{public, session};

// --- Public Re-exports ---

pub use auth::{HttpTokenRefresher, MockTokenRefresher, RefresherState, TokenRefresher};
pub use config::AppConfig;
pub use gate::{GateOutcome, Navigation, RedirectReason};
pub use policy::RoutePolicy;
pub use upstream::{UpstreamProxy, UpstreamState};

/// ApiDoc
///
/// OpenAPI document for the gate's own endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::health, handlers::logout, handlers::get_session),
    components(schemas(models::CurrentUser, models::ErrorResponse)),
    tags(
        (name = "lms-admin-gate", description = "Session gate in front of the LMS admin console")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a navigation needs, built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Mints new access tokens from refresh tokens.
    pub refresher: RefresherState,
    /// Role to allowed-route table, compiled at startup.
    pub policy: Arc<RoutePolicy>,
    /// Where admitted traffic is forwarded.
    pub upstream: UpstreamState,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for RefresherState {
    fn from_ref(app_state: &AppState) -> RefresherState {
        app_state.refresher.clone()
    }
}

impl FromRef<AppState> for Arc<RoutePolicy> {
    fn from_ref(app_state: &AppState) -> Arc<RoutePolicy> {
        app_state.policy.clone()
    }
}

impl FromRef<AppState> for UpstreamState {
    fn from_ref(app_state: &AppState) -> UpstreamState {
        app_state.upstream.clone()
    }
}

/// session_gate
///
/// Middleware running the session gate on every guarded navigation (`/`,
/// `/dashboard`, `/dashboard/*`). Other paths go straight through.
async fn session_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if !policy::is_guarded(&path) {
        return next.run(request).await;
    }

    let nav = Navigation::from_jar(path, &jar);
    let now = chrono::Utc::now().timestamp();
    let outcome = gate::evaluate(
        &nav,
        state.refresher.as_ref(),
        &state.policy,
        &state.config,
        now,
    )
    .await;

    match outcome {
        GateOutcome::Pass => next.run(request).await,
        GateOutcome::PassWithCookie { access_token } => {
            // The page rendered behind the gate should already see the fresh token.
            if let Some(cookie_header) = gate::forwarded_cookie_header(&jar, &access_token) {
                request.headers_mut().insert(header::COOKIE, cookie_header);
            }
            let response = next.run(request).await;
            let cookie = gate::session_cookie(access_token, &state.config.env);
            (jar.add(cookie), response).into_response()
        }
        GateOutcome::ClearAndPass => {
            let response = next.run(request).await;
            (gate::clear_session(jar), response).into_response()
        }
        GateOutcome::Redirect { location, .. } => {
            (gate::clear_session(jar), Redirect::temporary(&location)).into_response()
        }
    }
}

/// create_router
///
/// Assembles the gate's routes, the upstream fallback, the session gate middleware
/// and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(session::session_routes())
        // Anything not answered here is the admin UI itself.
        .fallback(upstream::forward)
        .layer(middleware::from_fn_with_state(state.clone(), session_gate))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, correlated by its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
