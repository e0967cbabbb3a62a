//! pantry-auth - sign-in and route protection for the pantry tracker
//!
//! # Architecture
//!
//! ```text
//! browser ──► /api/auth/signin/google ──► Google consent
//!                                              │
//! browser ◄── session cookie ◄── /api/auth/callback/google
//!    │                               (provider → users table → issuer)
//!    ▼
//! route_guard (signature check only) ──► handlers ──► Auth / auth()
//!                                                   (refresh from users table)
//! ```
//!
//! # Modules
//!
//! - `auth`: Google OAuth, session tokens, route guard, session accessors
//! - `api`: Landing/dashboard pages and metrics endpoint
//! - `data`: SQLite user store
//! - `deploy`: Deployment descriptor
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod deploy;
pub mod error;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; everything inside is read-only.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// User store
    pub db: Arc<data::Database>,

    /// Protected path patterns
    pub guard: Arc<auth::RouteGuard>,

    /// Google OAuth client
    pub provider: Arc<auth::GoogleProvider>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Compile protected path patterns
    /// 3. Build the OAuth client
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.connection_string()).await?;

        let guard = auth::RouteGuard::from_config(&config.guard)?;
        tracing::info!(
            protected_paths = ?config.guard.protected_paths,
            landing_route = %config.guard.landing_route,
            "Route guard configured"
        );

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("pantry-auth/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;
        let provider = auth::GoogleProvider::new(&config.auth, http_client);

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            guard: Arc::new(guard),
            provider: Arc::new(provider),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments. The fallback sits inside the
/// route guard, so protected paths without a handler still redirect.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::pages_router())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::route_guard,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound
}
