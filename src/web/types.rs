use serde::{Deserialize, Serialize};

use crate::oauth::RequestToken;
use crate::types::Username;

/// Where a session stands in the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    /// Request token issued, waiting for the provider to redirect back.
    Pending,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Danger,
}

/// One-shot message shown on the next portal page view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Danger,
            message: message.into(),
        }
    }
}

/// Server-held data of one browser session.
///
/// Passed to and from [`SessionStore`](super::SessionStore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub username: Option<Username>,
    /// Present only between `/login` and `/oauth-callback`.
    pub request_token: Option<RequestToken>,
    #[serde(default)]
    pub notices: Vec<Notice>,
}

impl SessionData {
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.username.is_some() {
            SessionState::Authenticated
        } else if self.request_token.is_some() {
            SessionState::Pending
        } else {
            SessionState::Anonymous
        }
    }

    /// Start a handshake; any previous identity is dropped.
    pub fn begin_handshake(&mut self, request_token: RequestToken) {
        self.username = None;
        self.request_token = Some(request_token);
    }

    /// Remove and return the pending request token.
    pub fn take_request_token(&mut self) -> Option<RequestToken> {
        self.request_token.take()
    }

    pub fn authenticate(&mut self, username: Username) {
        self.request_token = None;
        self.username = Some(username);
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
