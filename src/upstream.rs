use std::sync::Arc;

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Largest request body forwarded to the UI server.
pub const MAX_FORWARD_BODY_BYTES: usize = 10 * 1024 * 1024;

// Connection-scoped headers that must not cross the proxy.
const HOP_BY_HOP: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("request body could not be read: {0}")]
    Body(#[from] axum::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            ProxyError::Body(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        tracing::error!(error = %self, "proxying to upstream failed");
        (status, Json(ErrorResponse::fail(self.to_string()))).into_response()
    }
}

/// UpstreamProxy
///
/// Forwards admitted requests to the admin UI server. Redirects from upstream are
/// passed back to the browser, never followed.
#[derive(Clone)]
pub struct UpstreamProxy {
    client: reqwest::Client,
    base_url: String,
}

pub type UpstreamState = Arc<UpstreamProxy>;

impl UpstreamProxy {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn target_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    /// Sends `request` upstream and relays status, headers and body.
    pub async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self.target_url(path_and_query);
        let body = to_bytes(body, MAX_FORWARD_BODY_BYTES).await?;

        tracing::debug!(method = %parts.method, %url, "forwarding to upstream");

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(strip_hop_by_hop(parts.headers))
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers().clone());
        let bytes = upstream.bytes().await?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}

/// forward
///
/// Router fallback: everything the gate's own routes don't answer goes upstream.
pub async fn forward(
    State(upstream): State<UpstreamState>,
    request: Request,
) -> Result<Response, ProxyError> {
    upstream.forward(request).await
}
