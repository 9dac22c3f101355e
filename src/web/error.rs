use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use super::{DENIED_PATH, PORTAL_PATH};

/// Errors surfaced by the portal's HTTP layer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WebError {
    /// No logged-in user in the session.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Logged in, but not on the allow-list.
    #[error("Not authorized")]
    Forbidden,

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => Redirect::to(PORTAL_PATH).into_response(),
            Self::Forbidden => Redirect::to(DENIED_PATH).into_response(),
            Self::Store(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Portal internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
