//! Google OAuth2 provider
//!
//! Authorization-code flow against Google's endpoints. The profile comes
//! from the OpenID Connect userinfo endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::profile::{Credentials, DisplayProfile, UserProfile};
use super::provider::{IdentityProvider, TokenSet};
use crate::config::OAuthProviderConfig;
use crate::error::AppError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub(crate) const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Google token request
#[derive(Debug, Serialize)]
struct GoogleTokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'static str,
}

/// Google token response
#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    id_token: Option<String>,
}

/// Google userinfo response
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
    email: Option<String>,
    locale: Option<String>,
    hd: Option<String>,
}

/// Google OAuth2 provider
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a provider from configuration
    ///
    /// # Errors
    /// `AppError::Config` when credentials are empty or an endpoint
    /// override is not a URL
    pub fn new(config: &OAuthProviderConfig, redirect_uri: String) -> Result<Self, AppError> {
        config.validate("google")?;
        url::Url::parse(&redirect_uri)
            .map_err(|e| AppError::Config(format!("Invalid google callback URL: {e}")))?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("authgate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri,
            scopes: config.scopes.clone(),
            auth_url: config
                .auth_url
                .clone()
                .unwrap_or_else(|| GOOGLE_AUTH_URL.to_string()),
            token_url: config
                .token_url
                .clone()
                .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            userinfo_url: config
                .userinfo_url
                .clone()
                .unwrap_or_else(|| GOOGLE_USERINFO_URL.to_string()),
            http_client,
        })
    }

    fn convert_userinfo(&self, info: GoogleUserInfo, tokens: &TokenSet) -> UserProfile {
        UserProfile {
            provider: self.name().to_string(),
            display: DisplayProfile {
                user_id: info.sub,
                nickname: info.name.clone(),
                name: info.name,
                first_name: info.given_name,
                last_name: info.family_name,
                email: info.email,
                avatar_url: info.picture,
                location: info.locale,
                description: info.hd.map(|domain| format!("Workspace domain {domain}")),
            },
            credentials: Credentials {
                access_token: tokens.access_token.clone(),
                refresh_token: tokens.refresh_token.clone(),
                expires_at: tokens.expires_at,
            },
        }
    }
}

/// `now + seconds`, or `None` when that is not a representable instant
fn expiry_after(seconds: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(seconds).and_then(|ttl| Utc::now().checked_add_signed(ttl))
}

fn upstream_failure(step: &str, error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::AuthenticationFailed(format!("{step} timed out"))
    } else {
        AppError::AuthenticationFailed(format!("{step} failed: {error}"))
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn display_name(&self) -> &str {
        "Google"
    }

    fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        let mut url = url::Url::parse(&self.auth_url)
            .map_err(|e| AppError::Config(format!("Invalid auth URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AppError> {
        let request = GoogleTokenRequest {
            code,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            redirect_uri: &self.redirect_uri,
            grant_type: "authorization_code",
        };

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&request)
            .send()
            .await
            .map_err(|e| upstream_failure("Token request", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Google token endpoint rejected the code");
            return Err(AppError::AuthenticationFailed(format!(
                "Token request failed with status {status}"
            )));
        }

        let tokens: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| upstream_failure("Token response parsing", e))?;

        let expires_at = match tokens.expires_in {
            Some(seconds) => Some(expiry_after(seconds).ok_or_else(|| {
                AppError::AuthenticationFailed(format!(
                    "Token response carries out-of-range expires_in {seconds}"
                ))
            })?),
            None => None,
        };

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            id_token: tokens.id_token,
            expires_at,
        })
    }

    async fn fetch_profile(&self, tokens: &TokenSet) -> Result<UserProfile, AppError> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| upstream_failure("UserInfo request", e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::AuthenticationFailed(format!(
                "UserInfo request failed with status {status}"
            )));
        }

        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| upstream_failure("UserInfo parsing", e))?;

        Ok(self.convert_userinfo(info, tokens))
    }
}
