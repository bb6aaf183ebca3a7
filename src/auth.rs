use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use reqwest::{StatusCode, header};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::{config::AppConfig, models::CurrentUser};

/// SessionClaims
///
/// Payload carried by the refresh token. The gate sources identity and role from
/// this claim set; the access token's content is never read beyond its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Backend user id. Accepted as a JSON string or number.
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub email: String,
    /// Role claim, e.g. "ADMIN".
    pub role: String,
    /// Issued At, seconds since the epoch.
    #[serde(default)]
    pub iat: i64,
    /// Expiration Time, seconds since the epoch.
    pub exp: i64,
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        CurrentUser {
            id: claims.id,
            email: claims.email,
            role: claims.role,
        }
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

#[derive(Clone, Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Validation used for every local decode. Expiry is compared against the caller's
/// clock instead of jsonwebtoken's so evaluations are deterministic.
fn claims_validation(verify_signature: bool) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    if !verify_signature {
        validation.insecure_disable_signature_validation();
    }
    validation
}

/// is_token_expired
///
/// Decodes the embedded `exp` claim locally and compares it to `now` (seconds).
/// A token that cannot be decoded, or carries no `exp`, counts as expired.
pub fn is_token_expired(token: &str, now: i64) -> bool {
    let key = DecodingKey::from_secret(&[]);
    match decode::<ExpiryClaim>(token, &key, &claims_validation(false)) {
        Ok(data) => data.claims.exp.is_none_or(|exp| exp <= now),
        Err(e) => {
            tracing::debug!(error = %e, "access token is not decodable");
            true
        }
    }
}

/// decode_session_claims
///
/// Reads the refresh-token claims. With a secret the HS256 signature is verified,
/// otherwise only the payload is decoded.
pub fn decode_session_claims(
    token: &str,
    secret: Option<&str>,
) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let (key, validation) = match secret {
        Some(secret) => (
            DecodingKey::from_secret(secret.as_bytes()),
            claims_validation(true),
        ),
        None => (DecodingKey::from_secret(&[]), claims_validation(false)),
    };
    decode::<SessionClaims>(token, &key, &validation).map(|data| data.claims)
}

/// current_user
///
/// Resolves the signed-in user from the refresh token. Absent or undecodable
/// refresh tokens mean "unauthenticated". Expiry is left to the refresh endpoint.
pub fn current_user(refresh_token: Option<&str>, secret: Option<&str>) -> Option<CurrentUser> {
    let token = refresh_token.filter(|token| !token.is_empty())?;

    let claims = match decode_session_claims(token, secret) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "refresh token claims are not decodable");
            return None;
        }
    };

    Some(claims.into())
}

/// RefreshError
///
/// Why a refresh attempt produced no access token. Never shown to the end user.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("refresh request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("refresh endpoint answered {0}")]
    Rejected(StatusCode),

    #[error("refresh response carried no access token")]
    MalformedResponse,
}

/// TokenRefresher Contract
///
/// Mints a new access token from a refresh token. The HTTP implementation talks to
/// the LMS API; the mock is used by the test suites.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<String, RefreshError>;
}

/// RefresherState
///
/// Shared handle to the refresher held in the application state.
pub type RefresherState = Arc<dyn TokenRefresher>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    access_token: Option<String>,
    data: Option<RefreshData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    access_token: Option<String>,
}

impl RefreshBody {
    fn into_access_token(self) -> Option<String> {
        self.data
            .and_then(|data| data.access_token)
            .or(self.access_token)
            .filter(|token| !token.is_empty())
    }
}

/// HttpTokenRefresher
///
/// POSTs to the refresh endpoint with the refresh token as the `Authorization`
/// header and reads `accessToken` from the JSON reply, either top-level or under
/// `data`. No timeout beyond the client's defaults.
#[derive(Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    refresh_url: String,
}

impl HttpTokenRefresher {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config.refresh_url())
    }

    pub fn with_client(client: reqwest::Client, refresh_url: impl Into<String>) -> Self {
        Self {
            client,
            refresh_url: refresh_url.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<String, RefreshError> {
        if refresh_token.is_empty() {
            return Err(RefreshError::MissingRefreshToken);
        }

        let response = self
            .client
            .post(&self.refresh_url)
            .header(header::AUTHORIZATION, refresh_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected(status));
        }

        let body: RefreshBody = response
            .json()
            .await
            .map_err(|_| RefreshError::MalformedResponse)?;

        body.into_access_token().ok_or(RefreshError::MalformedResponse)
    }
}

/// MockTokenRefresher
///
/// In-memory refresher for tests. Issues a fixed token (or rejects with 401) and
/// records how often it was asked.
#[derive(Default)]
pub struct MockTokenRefresher {
    issued_token: Option<String>,
    calls: AtomicUsize,
}

impl MockTokenRefresher {
    pub fn issuing(token: impl Into<String>) -> Self {
        Self {
            issued_token: Some(token.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for MockTokenRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<String, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.issued_token
            .clone()
            .ok_or(RefreshError::Rejected(StatusCode::UNAUTHORIZED))
    }
}
