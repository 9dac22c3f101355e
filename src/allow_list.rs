use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Deserialize)]
struct AllowListFile {
    #[serde(default)]
    trusted: Vec<String>,
}

/// Trusted usernames, read from a JSON file of the form `{"trusted": [...]}`.
///
/// Every check re-reads the file, so edits apply without a restart.
#[derive(Debug, Clone)]
pub struct AllowList {
    path: PathBuf,
}

impl AllowList {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents of the allow-list file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read or [`Error::Json`] if
    /// it is malformed.
    pub async fn load(&self) -> Result<Vec<String>, Error> {
        let raw = tokio::fs::read(&self.path).await?;
        let file: AllowListFile = serde_json::from_slice(&raw)?;
        Ok(file.trusted)
    }

    /// Whether `username` is currently trusted.
    ///
    /// # Errors
    ///
    /// Propagates [`load`](Self::load) failures; callers deny on error.
    pub async fn is_trusted(&self, username: &str) -> Result<bool, Error> {
        Ok(self.load().await?.iter().any(|u| u == username))
    }
}
