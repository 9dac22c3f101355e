use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use super::traits::SessionStore;
use super::types::{SessionData, SessionState};
use crate::types::SessionId;

#[derive(Debug)]
struct Entry {
    data: SessionData,
    saved_at: Instant,
}

/// In-process session store. Sessions are lost on restart.
///
/// Logged-in sessions expire `ttl` after their last save (7 days by
/// default, matching the cookie). Anything else, in practice a handshake
/// waiting for the provider, expires after `pending_ttl` (10 minutes), and
/// at most `max_pending` such sessions are kept: the oldest is evicted
/// first. Expired entries read as absent and are pruned on every save.
///
/// Cloning shares the same map.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<SessionId, Entry>>>,
    ttl: Duration,
    pending_ttl: Duration,
    max_pending: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            sessions: Arc::default(),
            ttl: Duration::from_secs(7 * 24 * 60 * 60),
            pending_ttl: Duration::from_secs(10 * 60),
            max_pending: 1024,
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime of a logged-in session.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Lifetime of a session that is not logged in.
    #[must_use]
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Cap on sessions that are not logged in (at least 1).
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max.max(1);
        self
    }

    /// Number of stored sessions, expired ones included until the next save.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn lifetime(&self, data: &SessionData) -> Duration {
        match data.state() {
            SessionState::Authenticated => self.ttl,
            SessionState::Pending | SessionState::Anonymous => self.pending_ttl,
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.saved_at) >= self.lifetime(&entry.data)
    }
}

impl SessionStore for MemoryStore {
    async fn load(
        &self,
        id: &SessionId,
    ) -> Result<Option<SessionData>, Box<dyn std::error::Error + Send + Sync>> {
        let now = Instant::now();
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| entry.data.clone()))
    }

    async fn save(
        &self,
        id: &SessionId,
        data: SessionData,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Expired sessions pruned");
        }

        if data.state() != SessionState::Authenticated {
            let mut pending: Vec<(SessionId, Instant)> = sessions
                .iter()
                .filter(|(key, entry)| {
                    *key != id && entry.data.state() != SessionState::Authenticated
                })
                .map(|(key, entry)| (key.clone(), entry.saved_at))
                .collect();
            if pending.len() >= self.max_pending {
                pending.sort_by_key(|(_, saved_at)| *saved_at);
                let excess = pending.len() + 1 - self.max_pending;
                for (key, _) in pending.into_iter().take(excess) {
                    sessions.remove(&key);
                }
                tracing::warn!(evicted = excess, "Pending session cap reached");
            }
        }

        sessions.insert(id.clone(), Entry { data, saved_at: now });
        Ok(())
    }

    async fn clear(&self, id: &SessionId) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::RequestToken;

    fn authenticated() -> SessionData {
        let mut data = SessionData::default();
        data.authenticate("Alice".parse().unwrap());
        data
    }

    fn pending() -> SessionData {
        let mut data = SessionData::default();
        data.begin_handshake(RequestToken {
            key: "rk".into(),
            secret: "rs".into(),
        });
        data
    }

    #[tokio::test]
    async fn save_load_clear() {
        let store = MemoryStore::new();
        let id = SessionId::generate();
        assert_eq!(store.load(&id).await.unwrap(), None);

        store.save(&id, authenticated()).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(authenticated()));

        store.clear(&id).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn clones_share_sessions() {
        let store = MemoryStore::new();
        let other = store.clone();
        store
            .save(&SessionId::generate(), SessionData::default())
            .await
            .unwrap();
        assert_eq!(other.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_expire_by_state() {
        let store = MemoryStore::new()
            .with_ttl(Duration::from_secs(3600))
            .with_pending_ttl(Duration::from_secs(60));
        let user = SessionId::generate();
        let handshake = SessionId::generate();
        store.save(&user, authenticated()).await.unwrap();
        store.save(&handshake, pending()).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.load(&handshake).await.unwrap(), None);
        assert_eq!(store.load(&user).await.unwrap(), Some(authenticated()));

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(store.load(&user).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn saving_refreshes_and_prunes() {
        let store = MemoryStore::new().with_ttl(Duration::from_secs(100));
        let active = SessionId::generate();
        let idle = SessionId::generate();
        store.save(&active, authenticated()).await.unwrap();
        store.save(&idle, authenticated()).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        store.save(&active, authenticated()).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(store.load(&active).await.unwrap().is_some());
        assert_eq!(store.load(&idle).await.unwrap(), None);

        store.save(&active, authenticated()).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_cap_evicts_oldest() {
        let store = MemoryStore::new().with_max_pending(2);
        let user = SessionId::generate();
        store.save(&user, authenticated()).await.unwrap();

        let ids: Vec<SessionId> = (0..3).map(|_| SessionId::generate()).collect();
        for id in &ids {
            store.save(id, pending()).await.unwrap();
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        assert_eq!(store.len().await, 3);
        assert_eq!(store.load(&ids[0]).await.unwrap(), None);
        assert!(store.load(&ids[1]).await.unwrap().is_some());
        assert!(store.load(&ids[2]).await.unwrap().is_some());
        assert!(store.load(&user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn resaving_pending_session_does_not_evict_itself() {
        let store = MemoryStore::new().with_max_pending(1);
        let id = SessionId::generate();
        store.save(&id, pending()).await.unwrap();
        store.save(&id, pending()).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_some());
    }
}
