use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::FileName;

/// Directory of files the bot publishes.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    content_type: String,
}

impl FileStore {
    /// Files are served as `image/jpeg` unless overridden.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            content_type: "image/jpeg".into(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    fn path_of(&self, name: &FileName) -> PathBuf {
        self.dir.join(name.as_str())
    }

    /// Contents of `name`, or `None` if there is no such file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] for failures other than a missing file.
    pub async fn read(&self, name: &FileName) -> Result<Option<Vec<u8>>, Error> {
        match tokio::fs::read(self.path_of(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove `name` from the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file does not exist or cannot be removed.
    pub async fn delete(&self, name: &FileName) -> Result<(), Error> {
        tokio::fs::remove_file(self.path_of(name)).await?;
        tracing::info!(file = %name, "File deleted");
        Ok(())
    }
}
