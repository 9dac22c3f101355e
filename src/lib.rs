#![doc = include_str!("../README.md")]

pub mod allow_list;
pub mod audit;
pub mod bot;
pub mod cluster;
pub mod control;
pub mod error;
pub mod file_name;
pub mod files;
pub mod identity;
pub mod oauth;
pub mod pod;
pub mod retention;
pub mod signing;
pub mod types;
pub mod web;

// Re-exports for convenient access
pub use allow_list::AllowList;
pub use audit::{AuditLog, AuditTail};
pub use bot::{BotBackend, Report, RestartOutcome};
pub use cluster::{ClusterClient, ClusterConfig};
pub use control::{ControlScript, ControlVerb};
pub use error::Error;
pub use file_name::is_valid_file_name;
pub use files::FileStore;
pub use identity::{Identity, verify_identity};
pub use oauth::{AccessToken, Handshaker, OAuthConfig, RequestToken};
pub use retention::{RetentionPolicy, RetentionSweep, SweepLock, SweepReport, WaybackClient};
pub use types::{FileName, PodName, SessionId, Username};
