//! Sign-in, sign-out and session endpoints
//!
//! Drives the Google authorization code flow and hands out the session
//! cookie.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::issuer::{SessionIssuer, TokenSource, VerifiedIdentity};
use super::middleware::refresh_session;
use super::provider::{GOOGLE_PROVIDER_ID, ProviderProfile};
use crate::AppState;
use crate::data::{Database, NewUser, User};
use crate::error::AppError;
use crate::metrics::SIGN_IN_ATTEMPTS_TOTAL;

/// Cookie holding the CSRF state between redirect and callback
const OAUTH_STATE_COOKIE: &str = "oauth_state";
/// The state cookie only has to survive one consent screen
const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

/// Paths served by [`auth_router`]; these must stay reachable when signed out
pub const AUTH_ROUTES: [&str; 5] = [
    "/api/auth/signin",
    "/api/auth/signin/google",
    "/api/auth/callback/google",
    "/api/auth/session",
    "/api/auth/signout",
];

/// Create authentication router
///
/// Routes:
/// - GET /api/auth/signin - Redirect to Google
/// - GET /api/auth/signin/google - Redirect to Google
/// - GET /api/auth/callback/google - OAuth callback
/// - GET /api/auth/session - Current session
/// - POST /api/auth/signout - Sign out
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signin", get(google_redirect))
        .route("/api/auth/signin/google", get(google_redirect))
        .route("/api/auth/callback/google", get(google_callback))
        .route("/api/auth/session", get(session))
        .route("/api/auth/signout", post(sign_out))
}

// =============================================================================
// Google OAuth
// =============================================================================

/// GET /api/auth/signin/google
///
/// Redirects user to Google consent page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to Google with client_id, redirect_uri, scope, state
async fn google_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();
    let location = state.provider.authorization_url(&csrf_state)?;

    let cookie = build_cookie(
        OAUTH_STATE_COOKIE,
        csrf_state,
        OAUTH_STATE_MAX_AGE_SECS,
        state.config.auth.should_use_secure_cookies(),
    );

    Ok((jar.add(cookie), Redirect::to(&location)))
}

/// Query parameters from Google callback
#[derive(Debug, Deserialize)]
struct GoogleCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Set when the user declined consent
    error: Option<String>,
}

/// GET /api/auth/callback/google
///
/// Handles OAuth callback from Google.
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for the user's profile
/// 3. Find or create the stored user and link the Google account
/// 4. Issue session token and set cookie
/// 5. Redirect to the signed-in landing page
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if let Err(error) = verify_csrf_state(query.state.as_deref(), &jar) {
        tracing::warn!("OAuth callback with missing or mismatched state");
        SIGN_IN_ATTEMPTS_TOTAL.with_label_values(&["csrf"]).inc();
        return Err(error);
    }
    let jar = jar.remove(removal_cookie(OAUTH_STATE_COOKIE));

    match complete_sign_in(&state, &query).await {
        Ok(cookie_value) => {
            SIGN_IN_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
            let cookie = build_cookie(
                state.config.auth.cookie_name.clone(),
                cookie_value,
                state.config.auth.session_max_age,
                state.config.auth.should_use_secure_cookies(),
            );
            Ok((
                jar.add(cookie),
                Redirect::to(&state.config.guard.after_sign_in),
            )
                .into_response())
        }
        Err(error) => {
            tracing::error!(%error, stage = "callback", "Sign-in failed");
            SIGN_IN_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
            let location = format!("{}?error=OAuthCallback", state.config.guard.landing_route);
            Ok((jar, Redirect::to(&location)).into_response())
        }
    }
}

async fn complete_sign_in(
    state: &AppState,
    query: &GoogleCallbackQuery,
) -> Result<String, AppError> {
    if let Some(error) = &query.error {
        return Err(AppError::IdentityProvider(format!(
            "provider returned error: {error}"
        )));
    }
    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::IdentityProvider("callback without code".to_string()))?;

    let profile = state.provider.exchange_code(code).await?;
    tracing::info!(email = %profile.email, "OAuth sign-in verified by provider");

    let user = find_or_create_user(&state.db, &profile).await?;

    let issuer = SessionIssuer::new(&state.config.auth);
    let identity = VerifiedIdentity {
        id: user.id,
        name: user.name,
        email: user.email,
        image: user.image,
    };
    let token = issuer
        .issue(TokenSource::FreshIdentity(identity), &*state.db)
        .await?;

    tracing::info!(email = ?token.email, "Successful sign-in");
    issuer.encode(&token)
}

/// Map a verified Google profile to a stored user.
///
/// Known Google accounts resolve to their linked user. Otherwise the user
/// with the same email is linked, or a new user is created and linked.
async fn find_or_create_user(db: &Database, profile: &ProviderProfile) -> Result<User, AppError> {
    if let Some(user) = db
        .get_user_by_account(GOOGLE_PROVIDER_ID, &profile.subject)
        .await?
    {
        return Ok(user);
    }

    let user = match db.get_user_by_email(&profile.email).await? {
        Some(user) => user,
        None => {
            let user = db
                .create_user(&NewUser {
                    name: profile.name.clone(),
                    email: profile.email.clone(),
                    image: profile.picture.clone(),
                })
                .await?;
            tracing::info!(user_id = %user.id, email = %user.email, "Created user on first sign-in");
            user
        }
    };

    db.link_account(GOOGLE_PROVIDER_ID, &profile.subject, &user.id)
        .await?;
    Ok(user)
}

// =============================================================================
// Session
// =============================================================================

/// GET /api/auth/session
///
/// Returns the refreshed session, or `{}` when signed out. The cookie is
/// re-issued with the refreshed claims, or cleared when its user is gone.
/// Other refresh failures answer with the error and leave the cookie alone.
async fn session(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    let cookie_name = state.config.auth.cookie_name.clone();

    let mut response = match refresh_session(&state, &headers).await {
        Ok(Some((token, session))) => {
            match SessionIssuer::new(&state.config.auth).encode(&token) {
                Ok(value) => {
                    let cookie = build_cookie(
                        cookie_name,
                        value,
                        state.config.auth.session_max_age,
                        state.config.auth.should_use_secure_cookies(),
                    );
                    (jar.add(cookie), Json(session)).into_response()
                }
                Err(error) => error.into_response(),
            }
        }
        Ok(None) => Json(serde_json::json!({})).into_response(),
        Err(error @ AppError::UserNotFound { .. }) => {
            tracing::warn!(%error, stage = "session", "Clearing invalid session");
            (
                jar.remove(removal_cookie(cookie_name)),
                Json(serde_json::json!({})),
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!(%error, stage = "session", "Session refresh failed");
            error.into_response()
        }
    };

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

// =============================================================================
// Sign out
// =============================================================================

/// POST /api/auth/signout
///
/// Clears session cookies and redirects to the landing route.
async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(removal_cookie(state.config.auth.cookie_name.clone()))
        .remove(removal_cookie(OAUTH_STATE_COOKIE));

    (jar, Redirect::to(&state.config.guard.landing_route))
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(state: Option<&str>, jar: &CookieJar) -> Result<(), AppError> {
    let expected = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .ok_or(AppError::Unauthorized)?;

    use subtle::ConstantTimeEq;
    match state {
        Some(state) if state.as_bytes().ct_eq(expected.as_bytes()).into() => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

fn build_cookie(
    name: impl Into<String>,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.into(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(cookie::time::Duration::seconds(max_age_secs))
        .build()
}

fn removal_cookie(name: impl Into<String>) -> Cookie<'static> {
    Cookie::build((name.into(), "")).path("/").build()
}
