//! HTTP surface of the portal.
//!
//! All routes share one [`portal_routes`] router, generic over the bot
//! backend and the session store.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bot_portal::ClusterClient;
//! use bot_portal::web::{BackendConfig, MemoryStore, PortalConfig, portal_routes};
//!
//! let config = PortalConfig::from_env()?;
//! let app = match BackendConfig::from_env()? {
//!     BackendConfig::Cluster(c) => portal_routes(config, ClusterClient::new(c)?, MemoryStore::new()),
//!     BackendConfig::Script(script) => portal_routes(config, script, MemoryStore::new()),
//! };
//! axum::serve(listener, app).await?;
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod pages;
mod render;
mod routes;
mod state;
mod store;
mod traits;
mod types;


pub use config::{BackendConfig, PortalConfig};
pub use error::WebError;
pub use routes::portal_routes;
pub use store::MemoryStore;
pub use traits::SessionStore;
pub use types::{Notice, NoticeLevel, SessionData, SessionState};

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;

pub(crate) const PORTAL_PATH: &str = "/admin";
pub(crate) const DENIED_PATH: &str = "/403";
pub(crate) const LOGIN_PATH: &str = "/login";
pub(crate) const LOGOUT_PATH: &str = "/logout";
pub(crate) const STATUS_PATH: &str = "/status";
pub(crate) const LOG_PATH: &str = "/log";
pub(crate) const AUDIT_PATH: &str = "/audit";
