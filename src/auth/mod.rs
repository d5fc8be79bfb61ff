//! OAuth authentication
//!
//! Handles:
//! - Provider registration (Google by default)
//! - Authorization-code login flow
//! - Cookie session management

mod context;
pub mod google;
mod oauth;
pub mod profile;
pub mod provider;
mod render;
pub mod session;

pub use context::AuthContext;
pub use oauth::auth_router;
pub use profile::{Credentials, DisplayProfile, UserProfile};
pub use provider::{IdentityProvider, ProviderRegistry, TokenSet};
pub use session::{PendingLogin, Session, SessionPolicy, SessionStore};
