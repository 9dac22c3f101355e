use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use super::config::PortalConfig;
use super::error::WebError;
use super::extractor::CurrentSession;
use super::pages;
use super::state::AppState;
use super::traits::SessionStore;
use super::{DENIED_PATH, PORTAL_PATH};
use crate::bot::BotBackend;
use crate::error::Error;
use crate::oauth::{Handshaker, RequestToken};
use crate::types::Username;

/// Create the portal router.
pub fn portal_routes<B, S>(config: PortalConfig, backend: B, sessions: S) -> Router
where
    B: BotBackend,
    S: SessionStore,
{
    let state = AppState {
        handshaker: Arc::new(config.handshaker),
        backend: Arc::new(backend),
        sessions: Arc::new(sessions),
        allow_list: Arc::new(config.allow_list),
        audit: Arc::new(config.audit),
        files: Arc::new(config.files),
        settings: config.settings,
    };

    Router::new()
        .route("/", get(pages::health))
        .route("/file/{name}", get(pages::show_file::<B, S>))
        .route(PORTAL_PATH, get(pages::portal::<B, S>))
        .route(
            "/delete",
            get(pages::back_to_portal).post(pages::delete_file::<B, S>),
        )
        .route(
            "/restart",
            get(pages::back_to_portal).post(pages::bot_action::<B, S>),
        )
        .route(
            super::STATUS_PATH,
            get(pages::bot_status::<B, S>).post(pages::bot_action::<B, S>),
        )
        .route(super::LOG_PATH, get(pages::bot_log::<B, S>))
        .route(super::AUDIT_PATH, get(pages::audit::<B, S>))
        .route(DENIED_PATH, get(pages::denied))
        .route(super::LOGIN_PATH, get(login::<B, S>))
        .route("/oauth-callback", get(callback::<B, S>))
        .route(super::LOGOUT_PATH, get(logout::<B, S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    mut session: CurrentSession,
) -> Result<(PrivateCookieJar, Redirect), WebError> {
    let initiation = match state.handshaker.initiate().await {
        Ok(initiation) => initiation,
        Err(e) => {
            tracing::error!(error = %e, "OAuth initiation failed");
            return Ok((session.jar, Redirect::to(PORTAL_PATH)));
        }
    };

    session.data.begin_handshake(initiation.request_token);
    let jar = session.save(&state).await?;
    Ok((jar, Redirect::to(&initiation.authorize_url)))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    oauth_verifier: Option<String>,
    oauth_token: Option<String>,
}

async fn callback<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    mut session: CurrentSession,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Redirect), WebError> {
    let request_token = session.data.take_request_token();
    let (Some(verifier), Some(returned_token), Some(request_token)) =
        (params.oauth_verifier, params.oauth_token, request_token)
    else {
        tracing::warn!("OAuth callback without a pending handshake");
        return abandon(session, &state).await;
    };

    let username = match confirm(&state.handshaker, &request_token, &verifier, &returned_token).await
    {
        Ok(username) => username,
        Err(e) => {
            tracing::warn!(error = %e, "OAuth handshake failed");
            return abandon(session, &state).await;
        }
    };

    let trusted = state
        .allow_list
        .is_trusted(username.as_str())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Allow-list unreadable; treating user as untrusted");
            false
        });

    session.rotate(&state).await?;
    session.data.authenticate(username.clone());
    let jar = session.save(&state).await?;

    if trusted {
        tracing::info!(user = %username, "Login successful");
        Ok((jar, Redirect::to(PORTAL_PATH)))
    } else {
        tracing::warn!(user = %username, "Login by user not on the allow-list");
        Ok((jar, Redirect::to(DENIED_PATH)))
    }
}

/// Exchange the verifier and confirm who the provider says the user is.
async fn confirm(
    handshaker: &Handshaker,
    request_token: &RequestToken,
    verifier: &str,
    returned_token: &str,
) -> Result<Username, Error> {
    let access_token = handshaker
        .complete(request_token, verifier, returned_token)
        .await?;
    let identity = handshaker.identify(&access_token).await?;
    Username::try_from(identity.username)
}

async fn abandon<B, S: SessionStore>(
    session: CurrentSession,
    state: &AppState<B, S>,
) -> Result<(PrivateCookieJar, Redirect), WebError> {
    let jar = session.clear(state).await?;
    Ok((jar, Redirect::to(PORTAL_PATH)))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<B: BotBackend, S: SessionStore>(
    State(state): State<AppState<B, S>>,
    session: CurrentSession,
) -> Result<(PrivateCookieJar, Redirect), WebError> {
    if let Some(user) = &session.data.username {
        tracing::info!(user = %user, "Logout");
    }
    abandon(session, &state).await
}
