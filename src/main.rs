//! authgate binary entry point

use authgate::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from `logging.*`
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start HTTP server
///
/// Configuration errors end the process before the listener is bound.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let loaded = config::AppConfig::load();

    // 2. Initialize tracing/logging; defaults if the config is unusable
    init_tracing(loaded.as_ref().ok().map(|config| &config.logging));

    tracing::info!("Starting authgate...");

    let config = match loaded {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "Invalid configuration, refusing to start");
            return Err(error.into());
        }
    };
    tracing::info!(
        public_url = %config.server.public_url,
        frontend = %config.frontend.redirect_url,
        secure_cookies = config.should_use_secure_cookies(),
        "Configuration loaded"
    );

    // 3. Initialize application state
    let state = AppState::new(config.clone())?;

    // 4. Build Axum router
    let app = authgate::build_router(state);

    // 5. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!(
        "Google callback URL: {}",
        config.server.callback_url("google")
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `logging.level` when set.
fn init_tracing(logging: Option<&config::LoggingConfig>) {
    let directive = logging.map_or_else(
        || "authgate=info,tower_http=debug".to_string(),
        config::LoggingConfig::filter_directive,
    );
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| directive.into());

    if logging.is_some_and(config::LoggingConfig::is_json) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
