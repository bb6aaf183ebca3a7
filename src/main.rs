use lms_admin_gate::{
    AppState, HttpTokenRefresher, RefresherState, RoutePolicy, UpstreamProxy,
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, compiles the route policy and serves the gate.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise verbose gate logs.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lms_admin_gate=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Session gate starting in {:?} mode", config.env);

    // 3. Collaborators
    let refresher = Arc::new(HttpTokenRefresher::new(&config)) as RefresherState;
    let upstream = UpstreamProxy::new(config.upstream_url.clone())
        .expect("FATAL: Failed to build the upstream HTTP client.");
    let policy = Arc::new(RoutePolicy::standard());

    tracing::info!(
        refresh_url = %config.refresh_url(),
        upstream = %config.upstream_url,
        "collaborators ready"
    );

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        config,
        refresher,
        policy,
        upstream: Arc::new(upstream),
    };

    // 4. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the listen address. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server stopped");
    }
}
