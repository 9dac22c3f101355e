use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio::sync::Mutex;

use crate::error::Error;

/// `%Y-%m-%d %H:%M:%S`, always UTC.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Most recent audit entries, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditTail {
    /// The log file does not exist yet.
    Empty,
    Entries(Vec<String>),
}

/// Plain-text audit trail, newest entry on the first line.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// Formats a UTC timestamp the way audit lines carry it.
#[must_use]
pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.to_offset(time::UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

impl AuditLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepend `<timestamp> <message>` to the log, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read or rewritten.
    pub async fn record(&self, message: &str) -> Result<(), Error> {
        self.record_at(OffsetDateTime::now_utc(), message).await
    }

    pub(crate) async fn record_at(&self, at: OffsetDateTime, message: &str) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let existing = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let line = format!("{} {message}\n", format_timestamp(at));
        tokio::fs::write(&self.path, line + &existing).await?;
        tracing::info!(audit = %message, "Audit entry recorded");
        Ok(())
    }

    /// At most `n` entries from the head of the log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] for read failures other than a missing file.
    pub async fn read_recent(&self, n: usize) -> Result<AuditTail, Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(AuditTail::Entries(
                content.lines().take(n).map(str::to_owned).collect(),
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(AuditTail::Empty),
            Err(e) => Err(e.into()),
        }
    }
}
