//! pantry-auth binary entry point

use pantry_auth::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration (fails fast on missing secrets)
/// 2. Initialize tracing/logging
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    init_tracing(&config.logging, config.auth.debug);
    tracing::info!("Starting pantry-auth...");
    tracing::info!(
        url = %config.auth.url,
        debug = config.auth.debug,
        "Configuration loaded"
    );
    config.warn_on_weak_settings();

    pantry_auth::metrics::init_metrics();

    // 3. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 4. Build Axum router
    let app = pantry_auth::build_router(state);

    // 5. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` wins; otherwise `logging.level`, raised to debug for this
/// crate when `auth.debug` is set.
fn init_tracing(logging: &config::LoggingConfig, debug: bool) {
    let default_filter = if debug {
        "pantry_auth=debug,tower_http=debug".to_string()
    } else {
        format!("pantry_auth={},tower_http=info", logging.level)
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
