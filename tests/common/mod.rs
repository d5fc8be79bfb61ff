//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use authgate::auth::{
    AuthContext, Credentials, DisplayProfile, IdentityProvider, Session, TokenSet, UserProfile,
};
use authgate::config;
use authgate::error::AppError;
use authgate::health::{DependencyHealth, HealthCheck, HealthReport};
use authgate::AppState;
use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::PrivateCookieJar;
use tokio::net::TcpListener;

/// Authorization code the fake provider accepts
pub const GOOD_CODE: &str = "good-code";
/// Access token the fake provider hands out
pub const FAKE_ACCESS_TOKEN: &str = "ya29.fake-access-token";
pub const FAKE_REFRESH_TOKEN: &str = "1//fake-refresh-token";
pub const FRONTEND_URL: &str = "http://localhost:5173";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Server with a fake Google provider and a healthy dependency set
    pub async fn new() -> Self {
        Self::with_parts(
            test_config(),
            Arc::new(FakeProvider::new("google", "Google")),
            Arc::new(FakeHealth::up()),
        )
        .await
    }

    /// Server whose provider list and health collaborator are supplied
    pub async fn with_parts(
        config: config::AppConfig,
        provider: Arc<FakeProvider>,
        health: Arc<dyn HealthCheck>,
    ) -> Self {
        let auth = AuthContext::with_providers(&config, vec![provider as Arc<dyn IdentityProvider>])
            .expect("auth context");
        Self::start(AppState::from_parts(config, auth, health)).await
    }

    /// Server built the same way the binary builds it
    pub async fn from_config(config: config::AppConfig) -> Self {
        Self::start(AppState::new(config).expect("app state")).await
    }

    async fn start(state: AppState) -> Self {
        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = authgate::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET with an optional `Cookie` header
    pub async fn get(&self, path: &str, cookies: &[(String, String)]) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if !cookies.is_empty() {
            request = request.header("Cookie", cookie_header(cookies));
        }
        request.send().await.expect("request succeeds")
    }

    /// Start a login and return the state token plus the cookies to replay
    pub async fn begin_login(&self) -> (String, Vec<(String, String)>) {
        let response = self.get("/auth/google", &[]).await;
        assert_eq!(response.status(), 302);

        let location = location(&response);
        let state = query_param(&location, "state").expect("state in authorization url");
        let cookies = response_cookies(&response);
        assert!(cookies.iter().any(|(name, _)| name == "oauth_state"));
        (state, cookies)
    }

    /// Decrypt the session the given cookies carry, as the server would
    pub fn load_session(&self, cookies: &[(String, String)]) -> Option<Session> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&cookie_header(cookies)).expect("cookie header"),
        );
        let sessions = &self.state.auth.sessions;
        let jar = PrivateCookieJar::from_headers(&headers, sessions.key().clone());
        sessions.load(&jar)
    }

    /// Run a full login and return the cookies of the signed-in browser
    pub async fn login(&self) -> Vec<(String, String)> {
        let (state, cookies) = self.begin_login().await;
        let response = self
            .get(
                &format!("/auth/callback/google?code={GOOD_CODE}&state={state}"),
                &cookies,
            )
            .await;
        assert_eq!(response.status(), 302);

        let session = response_cookies(&response)
            .into_iter()
            .filter(|(name, _)| name == "session")
            .collect::<Vec<_>>();
        assert_eq!(session.len(), 1, "callback must set exactly one session cookie");
        session
    }
}

/// Local development configuration with throwaway credentials
pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            public_url: "http://localhost:3000".to_string(),
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-that-is-32-bytes-long".to_string(),
            session_max_age: 2_592_000,
            production: false,
            state_max_age: 600,
        },
        frontend: config::FrontendConfig {
            redirect_url: FRONTEND_URL.to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        },
        providers: config::ProvidersConfig {
            google: config::OAuthProviderConfig {
                client_id: "abc".to_string(),
                client_secret: "xyz".to_string(),
                scopes: vec![
                    "openid".to_string(),
                    "email".to_string(),
                    "profile".to_string(),
                ],
                auth_url: None,
                token_url: None,
                userinfo_url: None,
                timeout_seconds: 5,
            },
        },
        health: config::HealthConfig::default(),
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// In-process identity provider that counts upstream calls
pub struct FakeProvider {
    name: &'static str,
    display_name: &'static str,
    pub exchanges: AtomicUsize,
    pub profile_fetches: AtomicUsize,
}

impl FakeProvider {
    pub fn new(name: &'static str, display_name: &'static str) -> Self {
        Self {
            name,
            display_name,
            exchanges: AtomicUsize::new(0),
            profile_fetches: AtomicUsize::new(0),
        }
    }

    pub fn upstream_calls(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst) + self.profile_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn display_name(&self) -> &str {
        self.display_name
    }

    fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        Ok(format!(
            "https://accounts.example.test/authorize?client_id=abc&state={state}"
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AppError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code != GOOD_CODE {
            return Err(AppError::AuthenticationFailed(
                "invalid_grant".to_string(),
            ));
        }
        Ok(TokenSet {
            access_token: FAKE_ACCESS_TOKEN.to_string(),
            refresh_token: Some(FAKE_REFRESH_TOKEN.to_string()),
            id_token: None,
            expires_at: None,
        })
    }

    async fn fetch_profile(&self, tokens: &TokenSet) -> Result<UserProfile, AppError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        let mut profile = fake_profile(self.name);
        profile.credentials = Credentials {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at,
        };
        Ok(profile)
    }
}

/// Everything `FakeProvider` reports for a successful `GOOD_CODE` login
pub fn fake_profile(provider: &str) -> UserProfile {
    UserProfile {
        provider: provider.to_string(),
        display: DisplayProfile {
            user_id: "1090".to_string(),
            name: Some("A B".to_string()),
            first_name: Some("A".to_string()),
            last_name: Some("B".to_string()),
            nickname: Some("A B".to_string()),
            email: Some("a@b.com".to_string()),
            avatar_url: Some("https://lh3.example.test/a.png".to_string()),
            location: Some("en".to_string()),
            description: None,
        },
        credentials: Credentials {
            access_token: FAKE_ACCESS_TOKEN.to_string(),
            refresh_token: Some(FAKE_REFRESH_TOKEN.to_string()),
            expires_at: None,
        },
    }
}

/// Health collaborator with a fixed answer
pub struct FakeHealth {
    report: HealthReport,
}

impl FakeHealth {
    pub fn up() -> Self {
        Self {
            report: HealthReport::from_checks(BTreeMap::new()),
        }
    }

    pub fn down(dependency: &str, reason: &str) -> Self {
        let mut checks = BTreeMap::new();
        checks.insert(
            dependency.to_string(),
            DependencyHealth::down(AppError::DependencyUnhealthy(reason.to_string())),
        );
        Self {
            report: HealthReport::from_checks(checks),
        }
    }
}

#[async_trait]
impl HealthCheck for FakeHealth {
    async fn check(&self) -> HealthReport {
        self.report.clone()
    }
}

/// Raw `Set-Cookie` header values
pub fn set_cookie_headers(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// Name/value pairs of cookies the response sets, removals excluded
pub fn response_cookies(response: &reqwest::Response) -> Vec<(String, String)> {
    set_cookie_headers(response)
        .iter()
        .filter(|header| !header.contains("Max-Age=0"))
        .filter_map(|header| {
            let pair = header.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            (!value.is_empty()).then(|| (name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// The `Set-Cookie` header for `name`, if any
pub fn set_cookie_for(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookie_headers(response)
        .into_iter()
        .find(|header| header.starts_with(&prefix))
}

pub fn cookie_header(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
