//! OAuth login flow
//!
//! Login start, provider callback and logout for any registered provider.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use super::context::AuthContext;
use super::profile::UserProfile;
use super::provider::IdentityProvider;
use super::render;
use super::session::Session;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::{CALLBACKS_TOTAL, LOGIN_STARTED_TOTAL, LOGOUTS_TOTAL};

/// Create authentication router
///
/// Routes:
/// - GET / - Provider login links
/// - GET /auth/:provider - Start (or complete) login
/// - GET /auth/callback/:provider - OAuth callback
/// - GET /logout/:provider - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/auth/:provider", get(login))
        .route("/auth/callback/:provider", get(callback))
        .route("/logout/:provider", get(logout))
}

/// Query parameters a provider sends back
#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// Anti-forgery state token
    state: Option<String>,
    /// Set instead of `code` when the user denied access
    error: Option<String>,
}

/// GET /
async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render::index_page(&state.auth.providers))
}

/// GET /auth/:provider
///
/// # Steps
/// 1. Reject unknown providers before anything else
/// 2. Existing session for this provider: render the user view
/// 3. Code and state on the query: finish the exchange inline
/// 4. Otherwise redirect to the provider with a fresh state token
async fn login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let auth = state.auth.as_ref();
    let client = auth.providers.get(&provider)?;

    if let Some(session) = auth.sessions.load(&jar) {
        if session.profile.provider == client.name() {
            tracing::debug!(
                provider = %client.name(),
                user = %session.profile.label(),
                "Reusing existing session"
            );
            return Ok(Html(render::user_page(client.name(), &session.profile.display))
                .into_response());
        }
    }

    if query.code.is_some() {
        match complete_login(auth, client.as_ref(), &query, &jar).await {
            Ok(session) => {
                let cookie = auth.sessions.session_cookie(&session)?;
                let page = render::user_page(client.name(), &session.profile.display);
                let jar = jar.add(cookie).add(auth.sessions.clear_state_cookie());
                return Ok((jar, Html(page)).into_response());
            }
            Err(error) => {
                tracing::debug!(provider = %client.name(), %error, "Inline completion failed, starting over");
            }
        }
    }

    begin_login(auth, client.as_ref(), jar)
}

/// GET /auth/callback/:provider
///
/// # Steps
/// 1. Verify the state against the pending login cookie
/// 2. Exchange the code and fetch the profile
/// 3. Set the session cookie, drop the state cookie
/// 4. Redirect to the frontend
///
/// Any failure is a 401 with no session; the pending login is consumed
/// either way.
async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let auth = state.auth.as_ref();
    let client = auth.providers.get(&provider)?;
    let outcome = complete_login(auth, client.as_ref(), &query, &jar).await;
    let jar = jar.add(auth.sessions.clear_state_cookie());

    match outcome {
        Ok(session) => {
            let cookie = auth.sessions.session_cookie(&session)?;
            CALLBACKS_TOTAL
                .with_label_values(&[client.name(), "success"])
                .inc();
            Ok((
                StatusCode::FOUND,
                jar.add(cookie),
                [(header::LOCATION, auth.frontend_url.clone())],
            )
                .into_response())
        }
        Err(error) => {
            CALLBACKS_TOTAL
                .with_label_values(&[client.name(), "failure"])
                .inc();
            Ok((jar, error).into_response())
        }
    }
}

/// GET /logout/:provider
///
/// Tells the browser to drop both cookies and always redirects to `/`.
///
/// Sessions live only in the cookie, so nothing is revoked server-side:
/// a copy of the `session` cookie taken before logout stays valid until
/// its own expiry.
async fn logout(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let sessions = &state.auth.sessions;
    let had_session = sessions.load(&jar).is_some();
    tracing::info!(provider = %provider, had_session, "Logout");
    LOGOUTS_TOTAL.inc();

    let jar = jar
        .add(sessions.clear_session_cookie())
        .add(sessions.clear_state_cookie());

    (StatusCode::TEMPORARY_REDIRECT, jar, [(header::LOCATION, "/")])
}

fn begin_login(
    auth: &AuthContext,
    provider: &dyn IdentityProvider,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let (pending, cookie) = auth.sessions.begin_login(provider.name())?;
    let location = provider.authorization_url(&pending.state)?;

    LOGIN_STARTED_TOTAL
        .with_label_values(&[provider.name()])
        .inc();
    tracing::info!(provider = %provider.name(), "Redirecting to identity provider");

    Ok((
        StatusCode::FOUND,
        jar.add(cookie),
        [(header::LOCATION, location)],
    )
        .into_response())
}

async fn complete_login(
    auth: &AuthContext,
    provider: &dyn IdentityProvider,
    query: &CallbackQuery,
    jar: &PrivateCookieJar,
) -> Result<Session, AppError> {
    if let Some(error) = &query.error {
        return Err(AppError::AuthenticationFailed(format!(
            "provider returned error {error:?}"
        )));
    }

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::AuthenticationFailed("missing authorization code".to_string()))?;
    let returned_state = query
        .state
        .as_deref()
        .ok_or_else(|| AppError::AuthenticationFailed("missing state".to_string()))?;

    let pending = auth
        .sessions
        .pending_login(jar)
        .ok_or_else(|| AppError::AuthenticationFailed("no pending login".to_string()))?;
    if !pending.matches(provider.name(), returned_state) {
        return Err(AppError::AuthenticationFailed(
            "state does not match pending login".to_string(),
        ));
    }

    let profile = provider.complete(code).await?;
    log_profile(&profile);

    Ok(auth.sessions.start_session(profile))
}

/// Diagnostic log of a fresh login. Tokens stay out.
fn log_profile(profile: &UserProfile) {
    let shown = &profile.display;
    tracing::info!(
        provider = %profile.provider,
        user_id = %shown.user_id,
        email = ?shown.email,
        name = ?shown.name,
        nickname = ?shown.nickname,
        location = ?shown.location,
        avatar_url = ?shown.avatar_url,
        has_refresh_token = profile.credentials.refresh_token.is_some(),
        expires_at = ?profile.credentials.expires_at,
        "User authenticated"
    );
}
