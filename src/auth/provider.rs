//! Identity provider seam
//!
//! Each provider turns an authorization code into a normalized
//! [`UserProfile`]. Handlers only ever see this trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::profile::UserProfile;
use crate::error::AppError;

/// Tokens returned by a provider's token endpoint
#[derive(Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[redacted]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth2 authorization-code provider
///
/// Every upstream failure, timeouts included, is reported as
/// [`AppError::AuthenticationFailed`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Path segment name, e.g. "google"
    fn name(&self) -> &str;

    /// Human readable name for login links
    fn display_name(&self) -> &str;

    /// Authorization endpoint URL carrying `state`
    fn authorization_url(&self, state: &str) -> Result<String, AppError>;

    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AppError>;

    /// Fetch the normalized profile for a token set
    async fn fetch_profile(&self, tokens: &TokenSet) -> Result<UserProfile, AppError>;

    /// Exchange plus profile fetch
    async fn complete(&self, code: &str) -> Result<UserProfile, AppError> {
        let tokens = self.exchange_code(code).await?;
        self.fetch_profile(&tokens).await
    }
}

/// Providers keyed by name, in registration order
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    order: Vec<String>,
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any earlier one with the same name
    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        let name = provider.name().to_ascii_lowercase();
        if self.providers.insert(name.clone(), provider).is_some() {
            tracing::warn!(provider = %name, "Replacing previously registered provider");
        } else {
            self.order.push(name);
        }
    }

    /// Look up a provider by path segment
    pub fn get(&self, name: &str) -> Result<Arc<dyn IdentityProvider>, AppError> {
        self.providers
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| AppError::UnsupportedProvider(name.to_string()))
    }

    /// Registered providers in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn IdentityProvider>> {
        self.order.iter().filter_map(|name| self.providers.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::profile::{Credentials, DisplayProfile};

    struct Named(&'static str);

    #[async_trait]
    impl IdentityProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn display_name(&self) -> &str {
            self.0
        }

        fn authorization_url(&self, state: &str) -> Result<String, AppError> {
            Ok(format!("https://{}.example/authorize?state={state}", self.0))
        }

        async fn exchange_code(&self, code: &str) -> Result<TokenSet, AppError> {
            Ok(TokenSet {
                access_token: format!("token-for-{code}"),
                refresh_token: None,
                id_token: None,
                expires_at: None,
            })
        }

        async fn fetch_profile(&self, tokens: &TokenSet) -> Result<UserProfile, AppError> {
            Ok(UserProfile {
                provider: self.0.to_string(),
                display: DisplayProfile {
                    user_id: tokens.access_token.clone(),
                    ..Default::default()
                },
                credentials: Credentials {
                    access_token: tokens.access_token.clone(),
                    ..Default::default()
                },
            })
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_rejects_unknown() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Named("google")));

        assert!(registry.get("Google").is_ok());
        assert!(matches!(
            registry.get("github"),
            Err(AppError::UnsupportedProvider(name)) if name == "github"
        ));
    }

    #[test]
    fn iteration_keeps_registration_order_without_duplicates() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Named("google")));
        registry.register(Arc::new(Named("github")));
        registry.register(Arc::new(Named("google")));

        let names: Vec<&str> = registry.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["google", "github"]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn complete_chains_exchange_and_profile() {
        let profile = Named("google").complete("abc").await.expect("profile");
        assert_eq!(profile.display.user_id, "token-for-abc");
        assert_eq!(profile.provider, "google");
    }

    #[test]
    fn token_set_debug_is_redacted() {
        let tokens = TokenSet {
            access_token: "ya29.secret".to_string(),
            refresh_token: Some("1//secret".to_string()),
            id_token: None,
            expires_at: None,
        };
        assert!(!format!("{tokens:?}").contains("secret"));
    }
}
