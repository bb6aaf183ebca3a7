use axum::http::HeaderValue;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    auth::{self, TokenRefresher},
    config::{AppConfig, Env},
    models::CurrentUser,
    policy::{LOGIN_PATH, Role, RoutePolicy},
};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Lifetime of a refreshed access-token cookie: 24 hours.
pub const ACCESS_TOKEN_MAX_AGE_SECS: i64 = 86_400;

/// Navigation
///
/// One incoming navigation: the requested path and whatever session cookies came
/// with it.
#[derive(Debug, Clone, Default)]
pub struct Navigation {
    pub path: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Navigation {
    pub fn from_jar(path: impl Into<String>, jar: &CookieJar) -> Self {
        let read = |name: &str| {
            jar.get(name)
                .map(|cookie| cookie.value().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            path: path.into(),
            access_token: read(ACCESS_TOKEN_COOKIE),
            refresh_token: read(REFRESH_TOKEN_COOKIE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// No decodable refresh token, or no access token could be obtained.
    Unauthenticated,
    /// Signed in, but the role may not enter the path.
    Forbidden,
}

/// GateOutcome
///
/// Terminal decision for a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Pass,
    /// Pass, and hand the freshly minted access token back as a cookie.
    PassWithCookie { access_token: String },
    /// Login page without a session: let it render, dropping residual cookies.
    ClearAndPass,
    Redirect {
        reason: RedirectReason,
        location: String,
    },
}

impl GateOutcome {
    pub fn is_redirect(&self) -> bool {
        matches!(self, GateOutcome::Redirect { .. })
    }
}

/// evaluate
///
/// Runs the session gate for a single navigation. `now` is the current Unix time in
/// seconds. A missing or expired access token that cannot be refreshed, a missing
/// identity, or a role that may not enter the path all end at the login page.
pub async fn evaluate(
    nav: &Navigation,
    refresher: &dyn TokenRefresher,
    policy: &RoutePolicy,
    config: &AppConfig,
    now: i64,
) -> GateOutcome {
    // Credentials are refreshed before authorization, even for paths that end up denied.
    let needs_refresh = nav
        .access_token
        .as_deref()
        .is_none_or(|token| auth::is_token_expired(token, now));

    let refreshed = if needs_refresh {
        refresh_access_token(nav, refresher).await
    } else {
        None
    };

    // Without a usable access token the navigation is unauthenticated, whatever the
    // refresh-token claim says.
    let has_access = !needs_refresh || refreshed.is_some();

    let secret = config.refresh_token_secret.as_deref();
    let user = auth::current_user(nav.refresh_token.as_deref(), secret).filter(|_| has_access);
    let Some(user) = user else {
        return unauthenticated(nav);
    };

    if !authorize(policy, &user, &nav.path) {
        tracing::warn!(
            user_id = %user.id,
            role = %user.role,
            path = %nav.path,
            "role may not enter path, redirecting to login"
        );
        return GateOutcome::Redirect {
            reason: RedirectReason::Forbidden,
            location: login_location(None),
        };
    }

    match refreshed {
        Some(access_token) => GateOutcome::PassWithCookie { access_token },
        None => GateOutcome::Pass,
    }
}

fn unauthenticated(nav: &Navigation) -> GateOutcome {
    if nav.path == LOGIN_PATH {
        return GateOutcome::ClearAndPass;
    }
    tracing::info!(path = %nav.path, "no session, redirecting to login");
    GateOutcome::Redirect {
        reason: RedirectReason::Unauthenticated,
        location: login_location(Some(&nav.path)),
    }
}

async fn refresh_access_token(nav: &Navigation, refresher: &dyn TokenRefresher) -> Option<String> {
    let Some(refresh_token) = nav.refresh_token.as_deref() else {
        tracing::debug!(path = %nav.path, "access token missing or expired and no refresh token");
        return None;
    };

    match refresher.refresh(refresh_token).await {
        Ok(token) => {
            tracing::debug!(path = %nav.path, "access token refreshed");
            Some(token)
        }
        Err(e) => {
            tracing::warn!(path = %nav.path, error = %e, "access token refresh failed");
            None
        }
    }
}

fn authorize(policy: &RoutePolicy, user: &CurrentUser, path: &str) -> bool {
    policy.allows(Role::from_claim(&user.role), path)
}

/// login_location
///
/// `/login`, optionally carrying the page to return to after signing in. Each path
/// segment is percent-encoded; the separating slashes are kept.
pub fn login_location(redirect_path: Option<&str>) -> String {
    match redirect_path {
        Some(path) => {
            let encoded = path
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect::<Vec<_>>()
                .join("/");
            format!("{LOGIN_PATH}?redirectPath={encoded}")
        }
        None => LOGIN_PATH.to_string(),
    }
}

/// session_cookie
///
/// The `accessToken` cookie set after a successful refresh.
pub fn session_cookie(access_token: String, env: &Env) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, access_token))
        .http_only(true)
        .secure(*env == Env::Production)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ACCESS_TOKEN_MAX_AGE_SECS))
        .build()
}

/// clear_session
///
/// Drops both session cookies. Only cookies the client actually sent produce a
/// removal `Set-Cookie`.
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"))
}

/// forwarded_cookie_header
///
/// Rebuilds the request `Cookie` header with a replacement access token so the
/// downstream service sees the refreshed credential. Other cookies are re-encoded
/// exactly as the client sent them.
pub fn forwarded_cookie_header(jar: &CookieJar, access_token: &str) -> Option<HeaderValue> {
    let mut pairs: Vec<String> = jar
        .iter()
        .filter(|cookie| cookie.name() != ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.stripped().encoded().to_string())
        .collect();
    pairs.push(format!("{ACCESS_TOKEN_COOKIE}={access_token}"));
    HeaderValue::from_str(&pairs.join("; ")).ok()
}
