//! Route protection and session access
//!
//! `route_guard` runs on every request and only verifies the token
//! signature, so it never touches the database. The `Auth` extractor and
//! [`auth`] go further and refresh the session from the stored user.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use super::issuer::{SessionIssuer, TokenSource};
use super::session::{LegacyUser, Session};
use super::token::SessionToken;
use crate::AppState;
use crate::config::{AuthConfig, GuardConfig};
use crate::error::AppError;
use crate::metrics::GUARD_DECISIONS_TOTAL;

// =============================================================================
// Path matching
// =============================================================================

/// A protected path pattern such as `/dashboard/:path*`
///
/// Matches the base path and everything below it, on segment boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    base: String,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, AppError> {
        if !pattern.starts_with('/') {
            return Err(AppError::Config(format!(
                "protected path {pattern:?} must start with '/'"
            )));
        }

        let base = pattern
            .strip_suffix("/:path*")
            .or_else(|| pattern.strip_suffix("/*"))
            .unwrap_or(pattern)
            .trim_end_matches('/');

        if base.contains(':') || base.contains('*') {
            return Err(AppError::Config(format!(
                "protected path {pattern:?} uses an unsupported matcher"
            )));
        }

        Ok(Self {
            base: base.to_string(),
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.base.is_empty() {
            return true;
        }
        match path.strip_prefix(self.base.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

// =============================================================================
// Route guard
// =============================================================================

/// Outcome of the guard for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Protected patterns plus where to send anonymous visitors
#[derive(Debug, Clone)]
pub struct RouteGuard {
    patterns: Vec<PathPattern>,
    landing_route: String,
}

impl RouteGuard {
    pub fn from_config(config: &GuardConfig) -> Result<Self, AppError> {
        let patterns = config
            .protected_paths
            .iter()
            .map(|pattern| PathPattern::parse(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            landing_route: config.landing_route.clone(),
        })
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(path))
    }

    /// Pure decision: redirect only when the path is protected and there is
    /// no valid token.
    pub fn decide(&self, path: &str, token: Option<&SessionToken>) -> GuardDecision {
        if self.is_protected(path) && token.is_none() {
            GuardDecision::Redirect(self.landing_route.clone())
        } else {
            GuardDecision::Allow
        }
    }
}

/// Middleware gating protected paths
///
/// # Usage
/// ```ignore
/// let app = Router::new()
///     .route("/dashboard", ...)
///     .layer(middleware::from_fn_with_state(state.clone(), route_guard));
/// ```
pub async fn route_guard(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = read_session_token(request.headers(), &state.config.auth);
    let path = request.uri().path().to_owned();

    match state.guard.decide(&path, token.as_ref()) {
        GuardDecision::Allow => {
            GUARD_DECISIONS_TOTAL.with_label_values(&["allow"]).inc();
            next.run(request).await
        }
        GuardDecision::Redirect(location) => {
            tracing::debug!(path = %path, location = %location, "Redirecting unauthenticated request");
            GUARD_DECISIONS_TOTAL.with_label_values(&["redirect"]).inc();
            Redirect::temporary(&location).into_response()
        }
    }
}

// =============================================================================
// Token extraction
// =============================================================================

/// Raw token candidates in the order they are tried: the session cookie,
/// then an `Authorization: Bearer` header.
fn token_candidates(headers: &HeaderMap, cookie_name: &str) -> Vec<String> {
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(cookie_name).map(|cookie| cookie.value().to_owned());
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned);

    cookie.into_iter().chain(bearer).collect()
}

/// Verified token from the request, if any
///
/// An invalid cookie falls through to the bearer token. Invalid, tampered
/// or expired tokens read as `None`.
pub fn read_session_token(headers: &HeaderMap, config: &AuthConfig) -> Option<SessionToken> {
    let issuer = SessionIssuer::new(config);
    token_candidates(headers, &config.cookie_name)
        .into_iter()
        .find_map(|raw| match issuer.decode(&raw) {
            Ok(token) => Some(token),
            Err(error) => {
                tracing::debug!(%error, "Ignoring invalid session token");
                None
            }
        })
}

// =============================================================================
// Session access
// =============================================================================

/// Verify the request token and refresh it from the stored user.
///
/// # Returns
/// `None` without a valid token, otherwise the refreshed token and its
/// session view.
///
/// # Errors
/// `UserNotFound` when the token's email no longer matches a user.
pub async fn refresh_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<(SessionToken, Session)>, AppError> {
    let Some(token) = read_session_token(headers, &state.config.auth) else {
        return Ok(None);
    };

    let refreshed = SessionIssuer::new(&state.config.auth)
        .issue(TokenSource::ExistingToken(token), &*state.db)
        .await?;
    let session = Session::from_token(&refreshed);

    Ok(Some((refreshed, session)))
}

/// Current session, or `None` when unauthenticated.
///
/// A failed refresh is logged and treated as signed out.
pub async fn auth(state: &AppState, headers: &HeaderMap) -> Option<Session> {
    match refresh_session(state, headers).await {
        Ok(session) => session.map(|(_, session)| session),
        Err(error) => {
            tracing::warn!(%error, "Session refresh failed; treating request as signed out");
            None
        }
    }
}

/// Extractor for the current session
///
/// Never rejects; check [`Auth::session`] for `None`.
///
/// # Usage
/// ```ignore
/// async fn handler(auth: Auth) -> impl IntoResponse {
///     match auth.get_user() {
///         Some(user) => format!("Hello, {}", user.user_id),
///         None => "Hello, stranger".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Auth(pub Option<Session>);

impl Auth {
    pub fn session(&self) -> Option<&Session> {
        self.0.as_ref()
    }

    /// `{userId}` shape kept for older callers
    pub fn get_user(&self) -> Option<LegacyUser> {
        self.0.as_ref().and_then(Session::legacy_user)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(Auth(Some(session)));
        }

        let app_state = AppState::from_ref(state);
        let session = auth(&app_state, &parts.headers).await;

        if let Some(session) = &session {
            parts.extensions.insert(session.clone());
        }

        Ok(Auth(session))
    }
}
