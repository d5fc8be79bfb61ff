//! Normalized user profile
//!
//! What a provider hands back after a successful exchange, split into the
//! parts that may be shown to the user and the credentials that may not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-agnostic identity fields
///
/// Safe to render and to log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayProfile {
    pub user_id: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// Tokens issued by the provider
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[redacted]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authenticated user profile
///
/// Produced per successful callback and held only inside the encrypted
/// session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider name, e.g. "google"
    pub provider: String,
    pub display: DisplayProfile,
    pub credentials: Credentials,
}

impl UserProfile {
    /// Best label for greeting the user
    pub fn label(&self) -> &str {
        self.display
            .name
            .as_deref()
            .or(self.display.nickname.as_deref())
            .or(self.display.email.as_deref())
            .unwrap_or(&self.display.user_id)
    }
}
