//! Landing and dashboard pages
//!
//! Minimal HTML so the sign-in flow and route protection can be used from a
//! browser.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;

use crate::AppState;
use crate::auth::{Auth, LegacyUser};
use crate::error::AppError;

/// Create pages router
///
/// Routes:
/// - GET / - Landing page with sign-in link
/// - GET /dashboard, /dashboard/, /dashboard/*rest - Signed-in area
/// - GET /api/user - `{userId}` of the current user
pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing_page))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/", get(dashboard))
        .route("/dashboard/*rest", get(dashboard))
        .route("/api/user", get(current_user))
}

#[derive(Debug, Deserialize)]
struct LandingQuery {
    error: Option<String>,
}

/// GET /
///
/// Renders the landing page. A sign-in failure arrives as `?error=`.
async fn landing_page(Query(query): Query<LandingQuery>) -> impl IntoResponse {
    let notice = query
        .error
        .map(|error| {
            format!(
                r#"<p class="error">Sign-in failed ({}). Please try again.</p>"#,
                html_escape::encode_text(&error)
            )
        })
        .unwrap_or_default();

    Html(format!(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>Pantry Tracker</title></head>
        <body>
            <h1>Pantry Tracker</h1>
            {notice}
            <a href="/api/auth/signin/google">Sign in with Google</a>
        </body>
        </html>
    "#
    ))
}

/// GET /dashboard
///
/// The route guard has already checked the token signature; the session is
/// refreshed here, so a deleted user is sent back to the landing page.
async fn dashboard(State(state): State<AppState>, auth: Auth) -> Response {
    let Some(session) = auth.session() else {
        return Redirect::to(&state.config.guard.landing_route).into_response();
    };

    let display_name = session
        .user
        .name
        .as_deref()
        .or(session.user.email.as_deref())
        .unwrap_or("there");

    Html(format!(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>Dashboard - Pantry Tracker</title></head>
        <body>
            <h1>Welcome, {}</h1>
            <form method="post" action="/api/auth/signout"><button>Sign out</button></form>
        </body>
        </html>
    "#,
        html_escape::encode_text(display_name)
    ))
    .into_response()
}

/// GET /api/user
async fn current_user(auth: Auth) -> Result<Json<LegacyUser>, AppError> {
    auth.get_user().map(Json).ok_or(AppError::Unauthorized)
}
