//! Session management
//!
//! Two cookies, no server-side session storage. Both travel through a
//! [`PrivateCookieJar`], so the browser sees only encrypted values:
//! - `session`: the authenticated profile
//! - `oauth_state`: the pending login's anti-forgery state

use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::profile::UserProfile;
use crate::config::AuthConfig;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session";
pub const STATE_COOKIE: &str = "oauth_state";

/// Shortest secret accepted for deriving the cookie key
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest cookie lifetime browsers honour (400 days)
pub const MAX_COOKIE_AGE_SECONDS: i64 = 400 * 24 * 60 * 60;

const STATE_TOKEN_BYTES: usize = 32;

/// User session data
///
/// Stored in a private cookie. Holds the full profile, credentials
/// included, so the cookie must never be readable by the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub profile: UserProfile,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// A login that has been sent to the provider and not yet called back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    /// Anti-forgery state token sent as `state=`
    pub state: String,
    pub provider: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingLogin {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Whether a callback's `state` and provider belong to this login
    pub fn matches(&self, provider: &str, state: &str) -> bool {
        !self.is_expired() && self.provider == provider && self.state == state
    }
}

/// Cookie policy, fixed at startup
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub secret: String,
    /// Session lifetime in seconds
    pub max_age: i64,
    /// Pending login lifetime in seconds
    pub state_max_age: i64,
    pub path: &'static str,
    pub http_only: bool,
    pub secure: bool,
}

impl SessionPolicy {
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            secret: auth.session_secret.clone(),
            max_age: auth.session_max_age,
            state_max_age: auth.state_max_age,
            path: "/",
            http_only: true,
            secure: auth.production,
        }
    }
}

/// Builds and reads the session and state cookies
pub struct SessionStore {
    policy: SessionPolicy,
    key: Key,
}

impl SessionStore {
    /// # Errors
    /// `AppError::Config` for a secret shorter than [`MIN_SECRET_BYTES`]
    /// or a lifetime outside `1..=MAX_COOKIE_AGE_SECONDS`
    pub fn new(policy: SessionPolicy) -> Result<Self, AppError> {
        if policy.secret.as_bytes().len() < MIN_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "session secret must be at least {} bytes",
                MIN_SECRET_BYTES
            )));
        }

        for (name, seconds) in [
            ("session max age", policy.max_age),
            ("state max age", policy.state_max_age),
        ] {
            if !(1..=MAX_COOKIE_AGE_SECONDS).contains(&seconds) {
                return Err(AppError::Config(format!(
                    "{name} must be between 1 and {MAX_COOKIE_AGE_SECONDS} seconds"
                )));
            }
        }

        let key = Key::derive_from(policy.secret.as_bytes());
        Ok(Self { policy, key })
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Key the private cookie jar encrypts with
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Create a fresh session for a just-authenticated profile
    pub fn start_session(&self, profile: UserProfile) -> Session {
        let now = Utc::now();
        Session {
            profile,
            created_at: now,
            expires_at: now + Duration::seconds(self.policy.max_age),
        }
    }

    /// Build the `session` cookie for a session
    ///
    /// The value is plain JSON; adding it to a [`PrivateCookieJar`]
    /// encrypts it.
    pub fn session_cookie(&self, session: &Session) -> Result<Cookie<'static>, AppError> {
        let payload = serde_json::to_string(session).map_err(|e| AppError::Internal(e.into()))?;
        Ok(self.cookie(SESSION_COOKIE, payload, self.policy.max_age))
    }

    /// Current session, if the request carries a valid one
    ///
    /// Missing, tampered, undecodable and expired cookies all yield `None`.
    pub fn load(&self, jar: &PrivateCookieJar) -> Option<Session> {
        let cookie = jar.get(SESSION_COOKIE)?;
        let session: Session = match serde_json::from_str(cookie.value()) {
            Ok(session) => session,
            Err(error) => {
                tracing::debug!(%error, "Discarding unreadable session cookie");
                return None;
            }
        };

        if session.is_expired() {
            tracing::debug!(provider = %session.profile.provider, "Session expired");
            return None;
        }
        Some(session)
    }

    /// Start a login: new state token plus the cookie that remembers it
    pub fn begin_login(&self, provider: &str) -> Result<(PendingLogin, Cookie<'static>), AppError> {
        let pending = PendingLogin {
            state: generate_state_token(),
            provider: provider.to_string(),
            expires_at: Utc::now() + Duration::seconds(self.policy.state_max_age),
        };
        let payload = serde_json::to_string(&pending).map_err(|e| AppError::Internal(e.into()))?;
        let cookie = self.cookie(STATE_COOKIE, payload, self.policy.state_max_age);
        Ok((pending, cookie))
    }

    /// The pending login recorded in the request's state cookie
    pub fn pending_login(&self, jar: &PrivateCookieJar) -> Option<PendingLogin> {
        let cookie = jar.get(STATE_COOKIE)?;
        match serde_json::from_str(cookie.value()) {
            Ok(pending) => Some(pending),
            Err(error) => {
                tracing::debug!(%error, "Discarding unreadable state cookie");
                None
            }
        }
    }

    /// Removal cookie for the session
    pub fn clear_session_cookie(&self) -> Cookie<'static> {
        self.removal_cookie(SESSION_COOKIE)
    }

    /// Removal cookie for the pending login
    pub fn clear_state_cookie(&self) -> Cookie<'static> {
        self.removal_cookie(STATE_COOKIE)
    }

    fn cookie(&self, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
        Cookie::build((name, value))
            .path(self.policy.path)
            .http_only(self.policy.http_only)
            .secure(self.policy.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(max_age))
            .build()
    }

    fn removal_cookie(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, ""))
            .path(self.policy.path)
            .http_only(self.policy.http_only)
            .secure(self.policy.secure)
            .same_site(SameSite::Lax)
            .build();
        cookie.make_removal();
        cookie
    }
}

fn generate_state_token() -> String {
    let mut bytes = [0_u8; STATE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
