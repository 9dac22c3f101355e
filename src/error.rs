use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The identity provider rejected or garbled an OAuth exchange.
    #[error("OAuth {operation} failed{}: {detail}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    OAuth {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Identity verification error: {0}")]
    Identity(String),
    #[error("Cluster API {operation} failed ({status}): {detail}")]
    Cluster {
        operation: &'static str,
        status: u16,
        detail: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Illegal file name: {0:?}")]
    InvalidFileName(String),
    #[error("Invalid username: {0:?}")]
    InvalidUsername(String),
    #[error("Control script timed out after {0:?}")]
    ControlTimeout(std::time::Duration),
    #[error("Archive request failed ({status}): {detail}")]
    Archive { status: u16, detail: String },
    #[error("Another run holds the lock file {}", .0.display())]
    Locked(PathBuf),
}
