//! authgate - OAuth2 login for a small web app
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HTTP Router (Axum)                        │
//! │  - CORS for the frontend origins                            │
//! │  - Request tracing                                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Auth Handlers                           │
//! │  - login start / callback / logout                          │
//! │  - index and user views                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │        Session Store         │   Identity Provider Clients  │
//! │  - private session cookie    │  - Google (reqwest)          │
//! │  - private state cookie      │                              │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: providers, sessions and the login flow
//! - `api`: health and metrics endpoints
//! - `health`: dependency health collaborators
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Built once before the listener starts; handlers only read it.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Session store and registered providers
    pub auth: Arc<auth::AuthContext>,

    /// Collaborator behind `/health`
    pub health: Arc<dyn health::HealthCheck>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Validate configuration
    /// 2. Build the session store and register providers
    /// 3. Build the health collaborator
    ///
    /// # Errors
    /// Returns `AppError::Config` if any step fails; the server must not
    /// start in that case
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        config.validate()?;
        let auth = auth::AuthContext::initialize(&config)?;
        let health = health::UpstreamHealth::from_config(&config)?;

        tracing::info!("Application state initialized successfully");

        Ok(Self::from_parts(config, auth, Arc::new(health)))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: config::AppConfig,
        auth: auth::AuthContext,
        health: Arc<dyn health::HealthCheck>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            health,
        }
    }
}

// PrivateCookieJar extracts its key from state
impl axum::extract::FromRef<AppState> for axum_extra::extract::cookie::Key {
    fn from_ref(state: &AppState) -> Self {
        state.auth.sessions.key().clone()
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    metrics::init_metrics();
    let cors_layer = build_cors_layer(&state.config.frontend);

    Router::new()
        .merge(auth::auth_router())
        .merge(api::health_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(frontend: &config::FrontendConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::{AllowOrigin, CorsLayer};

    let origins: Vec<HeaderValue> = frontend
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            let origin = origin.trim().trim_end_matches('/');
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::error!(%error, %origin, "Ignoring unparseable CORS origin");
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(300))
}
