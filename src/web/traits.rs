use std::future::Future;

use super::types::SessionData;
use crate::types::SessionId;

/// Server-side session persistence, keyed by the id carried in the cookie.
///
/// The portal ships [`MemoryStore`](super::MemoryStore); implement this for
/// a shared store when running more than one instance.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for RedisSessions {
///     async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, ...> {
///         let raw: Option<String> = self.conn().get(&id.0).await?;
///         Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?)
///     }
///     // save / clear ...
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Look up a session. `None` if it never existed or was cleared.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionData>, Box<dyn std::error::Error + Send + Sync>>>
           + Send;

    /// Create or replace a session.
    fn save(
        &self,
        id: &SessionId,
        data: SessionData,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send;

    /// Forget a session entirely.
    fn clear(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send;
}
