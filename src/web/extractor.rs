use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;

use super::cookies;
use super::error::WebError;
use super::state::AppState;
use super::traits::SessionStore;
use super::types::SessionData;
use crate::bot::BotBackend;
use crate::types::{SessionId, Username};

/// The caller's session, loaded from the store via the session cookie.
///
/// Anonymous callers get an empty session without an id; one is assigned
/// on the first [`save`](Self::save).
pub(super) struct CurrentSession {
    pub(super) id: Option<SessionId>,
    pub(super) data: SessionData,
    pub(super) jar: PrivateCookieJar,
}

impl<B: BotBackend, S: SessionStore> FromRequestParts<AppState<B, S>> for CurrentSession {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B, S>,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| WebError::Unauthenticated)?;

        let Some(id) = jar
            .get(&state.settings.session_cookie_name)
            .map(|c| SessionId(c.value().to_string()))
        else {
            return Ok(Self {
                id: None,
                data: SessionData::default(),
                jar,
            });
        };

        let stored = state
            .sessions
            .load(&id)
            .await
            .map_err(|e| WebError::Store(e.to_string()))?;

        // Unknown ids (expired or cleared) start over with a fresh session.
        Ok(match stored {
            Some(data) => Self {
                id: Some(id),
                data,
                jar,
            },
            None => Self {
                id: None,
                data: SessionData::default(),
                jar,
            },
        })
    }
}

impl CurrentSession {
    /// Persist the session and return the jar carrying its cookie.
    pub(super) async fn save<B, S: SessionStore>(
        self,
        state: &AppState<B, S>,
    ) -> Result<PrivateCookieJar, WebError> {
        let id = self.id.unwrap_or_else(SessionId::generate);
        state
            .sessions
            .save(&id, self.data)
            .await
            .map_err(|e| WebError::Store(e.to_string()))?;

        let cookie = cookies::session_cookie(
            &state.settings.session_cookie_name,
            &id.0,
            state.settings.session_ttl_days,
            state.settings.secure_cookies,
        );
        Ok(self.jar.add(cookie))
    }

    /// Drop the session from the store and expire the cookie.
    pub(super) async fn clear<B, S: SessionStore>(
        self,
        state: &AppState<B, S>,
    ) -> Result<PrivateCookieJar, WebError> {
        if let Some(id) = &self.id {
            state
                .sessions
                .clear(id)
                .await
                .map_err(|e| WebError::Store(e.to_string()))?;
        }
        let cookie = cookies::clear_session_cookie(&state.settings.session_cookie_name);
        Ok(self.jar.remove(cookie))
    }

    /// Move the session data under a new id, forgetting the old one.
    pub(super) async fn rotate<B, S: SessionStore>(
        &mut self,
        state: &AppState<B, S>,
    ) -> Result<(), WebError> {
        if let Some(old) = self.id.take() {
            state
                .sessions
                .clear(&old)
                .await
                .map_err(|e| WebError::Store(e.to_string()))?;
        }
        Ok(())
    }
}

/// A logged-in user. Anyone else is redirected to the portal page.
///
/// # Example
///
/// ```rust,ignore
/// async fn status(operator: Operator) -> impl IntoResponse {
///     format!("Hello, {}", operator.username)
/// }
/// ```
pub(super) struct Operator {
    pub(super) username: Username,
    pub(super) session: CurrentSession,
}

impl<B: BotBackend, S: SessionStore> FromRequestParts<AppState<B, S>> for Operator {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B, S>,
    ) -> Result<Self, Self::Rejection> {
        let session = CurrentSession::from_request_parts(parts, state).await?;
        let username = session
            .data
            .username
            .clone()
            .ok_or(WebError::Unauthenticated)?;
        Ok(Self { username, session })
    }
}

/// A logged-in user who is on the allow-list.
///
/// Rejections are audited and redirected to the denied page. An
/// unreadable allow-list denies.
pub(super) struct TrustedOperator(pub(super) Operator);

impl<B: BotBackend, S: SessionStore> FromRequestParts<AppState<B, S>> for TrustedOperator {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B, S>,
    ) -> Result<Self, Self::Rejection> {
        let operator = Operator::from_request_parts(parts, state).await?;

        let trusted = state
            .allow_list
            .is_trusted(operator.username.as_str())
            .await
            .unwrap_or_else(|e| {
                tracing::error!(
                    error = %e,
                    path = %state.allow_list.path().display(),
                    "Allow-list unreadable; denying"
                );
                false
            });
        if trusted {
            return Ok(Self(operator));
        }

        tracing::warn!(user = %operator.username, "Restricted action denied");
        let entry = format!(
            "\"{}\" tried to perform a restricted action but failed.",
            operator.username
        );
        if let Err(e) = state.audit.record(&entry).await {
            tracing::error!(error = %e, "Audit write failed");
        }
        Err(WebError::Forbidden)
    }
}
