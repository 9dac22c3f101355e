use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::PortalSettings;
use super::traits::SessionStore;
use crate::allow_list::AllowList;
use crate::audit::AuditLog;
use crate::bot::BotBackend;
use crate::files::FileStore;
use crate::oauth::Handshaker;

/// Shared state for portal handlers.
pub(super) struct AppState<B, S> {
    pub(super) handshaker: Arc<Handshaker>,
    pub(super) backend: Arc<B>,
    pub(super) sessions: Arc<S>,
    pub(super) allow_list: Arc<AllowList>,
    pub(super) audit: Arc<AuditLog>,
    pub(super) files: Arc<FileStore>,
    pub(super) settings: PortalSettings,
}

// Manual Clone: avoid derive adding `B: Clone, S: Clone` bounds.
impl<B, S> Clone for AppState<B, S> {
    fn clone(&self) -> Self {
        Self {
            handshaker: self.handshaker.clone(),
            backend: self.backend.clone(),
            sessions: self.sessions.clone(),
            allow_list: self.allow_list.clone(),
            audit: self.audit.clone(),
            files: self.files.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<B: BotBackend, S: SessionStore> FromRef<AppState<B, S>> for Key {
    fn from_ref(state: &AppState<B, S>) -> Self {
        state.settings.cookie_key.clone()
    }
}
