//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)
//!
//! A `.env` file is read into the process environment first, if present.

use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub frontend: FrontendConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub health: HealthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3000)
    pub port: u16,
    /// Externally visible base URL, used to build provider callback URLs
    pub public_url: String,
}

impl ServerConfig {
    /// Callback URL registered with a provider
    ///
    /// # Returns
    /// URL like "https://auth.example.com/auth/callback/google"
    pub fn callback_url(&self, provider: &str) -> String {
        format!(
            "{}/auth/callback/{}",
            self.public_url.trim_end_matches('/'),
            provider
        )
    }
}

/// Session policy
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes, no default)
    pub session_secret: String,
    /// Session max age in seconds (default: 2592000 = 30 days)
    pub session_max_age: i64,
    /// Production toggle; sets the Secure flag on cookies
    pub production: bool,
    /// Lifetime of a pending login's anti-forgery state in seconds
    pub state_max_age: i64,
}

/// Where the browser goes after login, and who may call us cross-origin
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    pub redirect_url: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

/// Registered identity providers
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub google: OAuthProviderConfig,
}

/// Credentials and endpoints for one OAuth2 provider
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Authorization endpoint override
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Token endpoint override
    #[serde(default)]
    pub token_url: Option<String>,
    /// UserInfo endpoint override
    #[serde(default)]
    pub userinfo_url: Option<String>,
    /// Timeout for each upstream call
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

fn default_provider_timeout() -> u64 {
    10
}

impl OAuthProviderConfig {
    /// Check that credentials are present and endpoint overrides are URLs
    pub fn validate(&self, provider: &str) -> Result<(), crate::error::AppError> {
        if self.client_id.trim().is_empty() {
            return Err(crate::error::AppError::Config(format!(
                "providers.{provider}.client_id must not be empty"
            )));
        }

        if self.client_secret.trim().is_empty() {
            return Err(crate::error::AppError::Config(format!(
                "providers.{provider}.client_secret must not be empty"
            )));
        }

        if self.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(format!(
                "providers.{provider}.timeout_seconds must be greater than 0"
            )));
        }

        for (field, value) in [
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("userinfo_url", &self.userinfo_url),
        ] {
            if let Some(value) = value {
                parse_http_url(value).map_err(|reason| {
                    crate::error::AppError::Config(format!(
                        "providers.{provider}.{field} is invalid: {reason}"
                    ))
                })?;
            }
        }

        Ok(())
    }
}

/// Health endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Probe provider token endpoints on every health check
    #[serde(default)]
    pub probe_upstream: bool,
    #[serde(default = "default_health_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_upstream: false,
            timeout_seconds: default_health_timeout(),
        }
    }
}

fn default_health_timeout() -> u64 {
    3
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Default `EnvFilter` directive for this level
    pub fn filter_directive(&self) -> String {
        format!("authgate={},tower_http=debug", self.level.trim().to_ascii_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

        if !LEVELS.contains(&self.level.trim().to_ascii_lowercase().as_str()) {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of {}",
                LEVELS.join(", ")
            )));
        }

        if !self.is_json() && !self.format.eq_ignore_ascii_case("pretty") {
            return Err(crate::error::AppError::Config(
                "logging.format must be \"pretty\" or \"json\"".to_string(),
            ));
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (AUTHGATE__*)
    /// 5. GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        if let Err(error) = dotenvy::dotenv() {
            if !error.not_found() {
                return Err(crate::error::AppError::Config(format!(
                    "failed to read .env file: {error}"
                )));
            }
        }

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("auth.session_max_age", 2_592_000)?
            .set_default("auth.production", false)?
            .set_default("auth.state_max_age", 600)?
            .set_default("frontend.redirect_url", "http://localhost:5173")?
            .set_default("providers.google.client_id", "")?
            .set_default("providers.google.client_secret", "")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("AUTHGATE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("frontend.allowed_origins")
                    .with_list_parse_key("providers.google.scopes")
                    .try_parsing(true),
            )
            .set_override_option(
                "providers.google.client_id",
                std::env::var("GOOGLE_CLIENT_ID").ok(),
            )?
            .set_override_option(
                "providers.google.client_secret",
                std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            )?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.auth.production
    }

    /// Reject configurations that must not reach traffic-serving state
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::auth::session::{MAX_COOKIE_AGE_SECONDS, MIN_SECRET_BYTES};

        if self.auth.session_secret.as_bytes().len() < MIN_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SECRET_BYTES
            )));
        }

        for (field, seconds) in [
            ("auth.session_max_age", self.auth.session_max_age),
            ("auth.state_max_age", self.auth.state_max_age),
        ] {
            if !(1..=MAX_COOKIE_AGE_SECONDS).contains(&seconds) {
                return Err(crate::error::AppError::Config(format!(
                    "{field} must be between 1 and {MAX_COOKIE_AGE_SECONDS} seconds"
                )));
            }
        }

        let public_url = parse_http_url(&self.server.public_url).map_err(|reason| {
            crate::error::AppError::Config(format!("server.public_url is invalid: {reason}"))
        })?;

        if self.auth.production && public_url.scheme() != "https" {
            return Err(crate::error::AppError::Config(
                "server.public_url must be https when auth.production is enabled".to_string(),
            ));
        }

        if !self.auth.production {
            tracing::warn!(
                public_url = %self.server.public_url,
                "Using insecure session cookies for local development"
            );
        }

        parse_http_url(&self.frontend.redirect_url).map_err(|reason| {
            crate::error::AppError::Config(format!("frontend.redirect_url is invalid: {reason}"))
        })?;

        for origin in &self.frontend.allowed_origins {
            parse_http_url(origin).map_err(|reason| {
                crate::error::AppError::Config(format!(
                    "frontend.allowed_origins entry {origin:?} is invalid: {reason}"
                ))
            })?;
        }

        self.providers.google.validate("google")?;
        self.logging.validate()?;

        Ok(())
    }
}

fn parse_http_url(value: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(value.trim()).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(format!("unsupported scheme {other:?}")),
    }
}
