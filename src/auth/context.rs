//! Auth initialization
//!
//! Everything the handlers need, built once before the listener starts
//! and shared read-only afterwards.

use std::sync::Arc;

use super::google::GoogleProvider;
use super::provider::{IdentityProvider, ProviderRegistry};
use super::session::{SessionPolicy, SessionStore};
use crate::config::AppConfig;
use crate::error::AppError;

/// Session store, registered providers and post-login destination
pub struct AuthContext {
    pub sessions: SessionStore,
    pub providers: ProviderRegistry,
    /// Where the browser lands after a successful callback
    pub frontend_url: String,
}

impl AuthContext {
    /// Build the context from configuration
    ///
    /// # Errors
    /// `AppError::Config` for missing credentials or a weak session secret.
    /// The server must not start serving when this fails.
    pub fn initialize(config: &AppConfig) -> Result<Self, AppError> {
        let sessions = SessionStore::new(SessionPolicy::from_config(&config.auth))?;

        let mut providers = ProviderRegistry::new();
        let google = GoogleProvider::new(
            &config.providers.google,
            config.server.callback_url("google"),
        )?;
        providers.register(Arc::new(google));

        tracing::info!(
            providers = providers.len(),
            secure_cookies = sessions.policy().secure,
            "Authentication initialized"
        );

        Ok(Self {
            sessions,
            providers,
            frontend_url: config.frontend.redirect_url.clone(),
        })
    }

    /// Build a context from explicit parts
    ///
    /// Used to swap in other provider implementations.
    pub fn with_providers(
        config: &AppConfig,
        providers: Vec<Arc<dyn IdentityProvider>>,
    ) -> Result<Self, AppError> {
        let sessions = SessionStore::new(SessionPolicy::from_config(&config.auth))?;

        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(provider);
        }

        Ok(Self {
            sessions,
            providers: registry,
            frontend_url: config.frontend.redirect_url.clone(),
        })
    }
}
