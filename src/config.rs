use std::env;

/// AppConfig
///
/// Holds the gate's entire configuration state. Loaded once at startup and immutable
/// afterwards; it is pulled out of the shared state via FromRef by the middleware and
/// the handlers that need it.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the `Secure` cookie flag and log format.
    pub env: Env,
    // Base URL of the LMS REST API that issues tokens.
    pub api_base_url: String,
    // Path (relative to api_base_url) of the token refresh endpoint.
    pub refresh_path: String,
    // Base URL of the admin UI server that admitted navigations are forwarded to.
    pub upstream_url: String,
    // Socket address the gate listens on.
    pub bind_addr: String,
    // Optional HMAC secret for refresh tokens. When unset, claims are read without
    // signature verification, as the browser-side session code does.
    pub refresh_token_secret: Option<String>,
}

/// Env
///
/// Runtime context. Production turns on secure cookies and JSON logs.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests, pointing at localhost services.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            upstream_url: "http://localhost:3001".to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            refresh_token_secret: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and fails fast on anything
    /// production cannot run without.
    ///
    /// # Panics
    /// Panics in `Env::Production` when `API_BASE_URL` or `UPSTREAM_URL` is missing.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let refresh_path =
            env::var("AUTH_REFRESH_PATH").unwrap_or_else(|_| DEFAULT_REFRESH_PATH.to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let refresh_token_secret = env::var("REFRESH_TOKEN_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty());

        match env {
            Env::Local => {
                let defaults = Self::default();
                Self {
                    env: Env::Local,
                    api_base_url: env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
                    refresh_path,
                    upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
                    bind_addr,
                    refresh_token_secret,
                }
            }
            Env::Production => Self {
                env: Env::Production,
                api_base_url: env::var("API_BASE_URL")
                    .expect("FATAL: API_BASE_URL required in prod"),
                refresh_path,
                upstream_url: env::var("UPSTREAM_URL")
                    .expect("FATAL: UPSTREAM_URL required in prod"),
                bind_addr,
                refresh_token_secret,
            },
        }
    }

    /// Full URL of the token refresh endpoint.
    pub fn refresh_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.refresh_path.trim_start_matches('/')
        )
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}
