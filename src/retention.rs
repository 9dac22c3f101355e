//! Offline sweep that archives stale served files and then removes them.
//!
//! A file is only deleted after the archive service has confirmed a capture
//! (or an existing snapshot). Failed archival is retried with exponential
//! backoff up to a bounded number of attempts; a file whose retries run out
//! is kept and reported.

use std::future::Future;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::error::Error;

/// One day, the unit the retention window is configured in.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Exponential backoff for archive submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failures`-th consecutive failure (1-based): base, 2×base, 4×base, …
    #[must_use]
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// What the sweep keeps, what it archives, and how.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    /// Lowercase extensions that are never archived nor deleted.
    pub excluded_extensions: Vec<String>,
    /// Public URL prefix under which the directory is served.
    pub public_base: String,
    pub retry: RetryPolicy,
    /// Pause after each successful archival before deleting.
    pub cooldown: Duration,
}

impl RetentionPolicy {
    /// 179 days, `tgs` excluded, 15s cooldown.
    #[must_use]
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            max_age: DAY * 179,
            excluded_extensions: vec!["tgs".into()],
            public_base: public_base.into(),
            retry: RetryPolicy::default(),
            cooldown: Duration::from_secs(15),
        }
    }

    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.excluded_extensions.iter().any(|x| *x == ext))
    }

    #[must_use]
    pub fn public_url(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.public_base.trim_end_matches('/'),
            urlencoding::encode(name)
        )
    }
}

/// Snapshot reference returned by the archive service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archived {
    pub archive_url: String,
    /// `false` when the service answered with an existing snapshot.
    pub captured: bool,
}

/// Web archive that can take a snapshot of a public URL.
///
/// Submitting the same URL twice must be harmless.
pub trait Archiver: Send + Sync {
    fn capture_or_cache(&self, url: &str) -> impl Future<Output = Result<Archived, Error>> + Send;
}

/// Client for the Wayback Machine's Save Page Now endpoint.
pub struct WaybackClient {
    save_url: String,
    archive_host: String,
    http: reqwest::Client,
}

impl WaybackClient {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            save_url: "https://web.archive.org/save".into(),
            archive_host: "https://web.archive.org".into(),
            http,
        })
    }

    /// Point at another deployment (or a test server).
    #[must_use]
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.save_url = format!("{base}/save");
        self.archive_host = base.to_string();
        self
    }
}

impl Archiver for WaybackClient {
    async fn capture_or_cache(&self, url: &str) -> Result<Archived, Error> {
        let response = self
            .http
            .get(format!("{}/{url}", self.save_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Archive {
                status: status.as_u16(),
                detail,
            });
        }

        let location = response
            .headers()
            .get(reqwest::header::CONTENT_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(match location {
            Some(path) => Archived {
                archive_url: format!("{}{path}", self.archive_host),
                captured: true,
            },
            None => Archived {
                archive_url: response.url().to_string(),
                captured: false,
            },
        })
    }
}

/// Marker file that keeps two sweeps from running at once.
///
/// Holds the owner's PID and is removed on drop. A lock left behind by a
/// run that died is taken over once it is stale: its PID no longer names a
/// live process (where `/proc` is available), or it is older than the
/// caller's limit.
#[derive(Debug)]
pub struct SweepLock {
    path: PathBuf,
}

impl SweepLock {
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if a live lock file already exists.
    pub fn acquire(path: impl Into<PathBuf>, stale_after: Duration) -> Result<Self, Error> {
        let path = path.into();
        match Self::create(&path) {
            Err(Error::Locked(_)) if Self::is_stale(&path, stale_after) => {
                tracing::warn!(path = %path.display(), "Removing stale sweep lock");
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                Self::create(&path)
            }
            other => other,
        }
    }

    fn create(path: &Path) -> Result<Self, Error> {
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::Locked(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let lock = Self {
            path: path.to_path_buf(),
        };
        writeln!(file, "{}", std::process::id())?;
        Ok(lock)
    }

    fn is_stale(path: &Path, stale_after: Duration) -> bool {
        let owner_gone = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| content.trim().parse::<u32>().ok())
            .is_some_and(|pid| {
                Path::new("/proc/self").exists() && !Path::new(&format!("/proc/{pid}")).exists()
            });
        let too_old = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > stale_after);
        owner_gone || too_old
    }
}

impl Drop for SweepLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to remove sweep lock");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    pub name: String,
    pub archive_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub archived: Vec<ArchivedFile>,
    pub failed: Vec<SweepFailure>,
    /// Files left alone: too young or excluded by extension.
    pub kept: usize,
    pub elapsed: Duration,
}

pub struct RetentionSweep<A> {
    dir: PathBuf,
    policy: RetentionPolicy,
    archiver: A,
}

impl<A: Archiver> RetentionSweep<A> {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, policy: RetentionPolicy, archiver: A) -> Self {
        Self {
            dir: dir.into(),
            policy,
            archiver,
        }
    }

    /// Names of regular files older than the retention window and not excluded.
    ///
    /// Entries that vanish while listing, cannot be inspected, or have a
    /// name that is not UTF-8 are logged and left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be listed.
    pub fn stale_files(&self, now: SystemTime) -> Result<(Vec<String>, usize), Error> {
        let mut stale = Vec::new();
        let mut kept = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, path = %entry.path().display(), "Skipping vanished or unreadable file");
                    continue;
                }
            };
            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(error = %e, path = %entry.path().display(), "Skipping file without mtime");
                    continue;
                }
            };
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(name = ?raw, "Keeping file with non-UTF-8 name");
                    kept += 1;
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > self.policy.max_age && !self.policy.is_excluded(&name) {
                stale.push(name);
            } else {
                kept += 1;
            }
        }
        stale.sort();
        Ok((stale, kept))
    }

    /// Submit `url`, retrying with backoff until the policy's attempts run out.
    async fn archive_with_retry(&self, url: &str) -> Result<Archived, Error> {
        let mut failures = 0;
        loop {
            match self.archiver.capture_or_cache(url).await {
                Ok(archived) => return Ok(archived),
                Err(e) => {
                    failures += 1;
                    if failures >= self.policy.retry.max_attempts {
                        return Err(e);
                    }
                    let delay = self.policy.retry.delay_after(failures);
                    tracing::warn!(error = %e, url, attempt = failures, ?delay, "Archive failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Archive then delete every stale file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be listed. Per-file
    /// failures are collected in the report instead.
    pub async fn run(&self) -> Result<SweepReport, Error> {
        let started = Instant::now();
        let (stale, kept) = self.stale_files(SystemTime::now())?;
        let mut report = SweepReport {
            kept,
            ..SweepReport::default()
        };

        for name in stale {
            let url = self.policy.public_url(&name);
            let archived = match self.archive_with_retry(&url).await {
                Ok(archived) => archived,
                Err(e) => {
                    tracing::error!(error = %e, file = %name, "Giving up on archival; file kept");
                    report.failed.push(SweepFailure {
                        name,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            tokio::time::sleep(self.policy.cooldown).await;

            match tokio::fs::remove_file(self.dir.join(&name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!(error = %e, file = %name, "Archived but could not delete");
                    report.failed.push(SweepFailure {
                        name,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            tracing::info!(
                count = report.archived.len() + 1,
                file = %name,
                archive_url = %archived.archive_url,
                captured = archived.captured,
                "Archived and removed"
            );
            report.archived.push(ArchivedFile {
                name,
                archive_url: archived.archive_url,
            });
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Fails the first `fail_first` submissions, then succeeds.
    struct FakeArchiver {
        fail_first: u32,
        calls: AtomicU32,
        submitted: Mutex<Vec<String>>,
    }

    impl FakeArchiver {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                calls: AtomicU32::new(0),
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    impl Archiver for FakeArchiver {
        async fn capture_or_cache(&self, url: &str) -> Result<Archived, Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.submitted.lock().unwrap().push(url.to_string());
            if call < self.fail_first {
                return Err(Error::Archive {
                    status: 429,
                    detail: "slow down".into(),
                });
            }
            Ok(Archived {
                archive_url: format!("https://archive.test/web/1/{url}"),
                captured: true,
            })
        }
    }

    fn quick_policy() -> RetentionPolicy {
        RetentionPolicy {
            retry: RetryPolicy {
                base_delay: Duration::from_millis(1),
                max_attempts: 3,
            },
            cooldown: Duration::ZERO,
            ..RetentionPolicy::new("https://bot.example.org/file")
        }
    }

    fn write_aged(dir: &Path, name: &str, age: Duration) {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn backoff_doubles() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_after(1), Duration::from_secs(30));
        assert_eq!(retry.delay_after(2), Duration::from_secs(60));
        assert_eq!(retry.delay_after(3), Duration::from_secs(120));
    }

    #[test]
    fn exclusion_is_case_insensitive() {
        let policy = RetentionPolicy::new("https://x");
        assert!(policy.is_excluded("sticker.tgs"));
        assert!(policy.is_excluded("sticker.TGS"));
        assert!(!policy.is_excluded("photo.jpg"));
        assert!(!policy.is_excluded("noext"));
    }

    #[test]
    fn public_url_joins_base() {
        let policy = RetentionPolicy::new("https://bot.example.org/file/");
        assert_eq!(policy.public_url("a.jpg"), "https://bot.example.org/file/a.jpg");
    }

    #[tokio::test]
    async fn archives_then_deletes_only_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        write_aged(dir.path(), "old.jpg", DAY * 200);
        write_aged(dir.path(), "new.jpg", DAY * 10);
        write_aged(dir.path(), "old.tgs", DAY * 300);

        let sweep = RetentionSweep::new(dir.path(), quick_policy(), FakeArchiver::new(0));
        let report = sweep.run().await.unwrap();

        assert_eq!(report.archived.len(), 1);
        assert_eq!(report.archived[0].name, "old.jpg");
        assert_eq!(report.kept, 2);
        assert!(report.failed.is_empty());
        assert!(!dir.path().join("old.jpg").exists());
        assert!(dir.path().join("new.jpg").exists());
        assert!(dir.path().join("old.tgs").exists());
        assert_eq!(
            *sweep.archiver.submitted.lock().unwrap(),
            vec!["https://bot.example.org/file/old.jpg".to_string()]
        );
    }

    #[tokio::test]
    async fn retries_until_archived() {
        let dir = tempfile::tempdir().unwrap();
        write_aged(dir.path(), "old.jpg", DAY * 200);

        let sweep = RetentionSweep::new(dir.path(), quick_policy(), FakeArchiver::new(2));
        let report = sweep.run().await.unwrap();

        assert_eq!(report.archived.len(), 1);
        assert_eq!(sweep.archiver.calls.load(Ordering::SeqCst), 3);
        assert!(!dir.path().join("old.jpg").exists());
    }

    #[tokio::test]
    async fn keeps_file_when_retries_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        write_aged(dir.path(), "old.jpg", DAY * 200);

        let sweep = RetentionSweep::new(dir.path(), quick_policy(), FakeArchiver::new(u32::MAX));
        let report = sweep.run().await.unwrap();

        assert!(report.archived.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "old.jpg");
        assert_eq!(sweep.archiver.calls.load(Ordering::SeqCst), 3);
        assert!(dir.path().join("old.jpg").exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn non_utf8_names_are_kept() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let raw = OsStr::from_bytes(b"bad\xff.jpg");
        let path = dir.path().join(raw);
        std::fs::write(&path, b"data").unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - DAY * 200)
            .unwrap();
        write_aged(dir.path(), "old.jpg", DAY * 200);

        let sweep = RetentionSweep::new(dir.path(), quick_policy(), FakeArchiver::new(0));
        let report = sweep.run().await.unwrap();

        assert_eq!(report.archived.len(), 1);
        assert_eq!(report.archived[0].name, "old.jpg");
        assert_eq!(report.kept, 1);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn only_regular_files_are_considered() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling.jpg"))
            .unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        write_aged(dir.path(), "old.jpg", DAY * 200);

        let sweep = RetentionSweep::new(dir.path(), quick_policy(), FakeArchiver::new(0));
        let (stale, kept) = sweep.stale_files(SystemTime::now()).unwrap();

        assert_eq!(stale, vec!["old.jpg".to_string()]);
        assert_eq!(kept, 0);
    }

    #[test]
    fn lock_prevents_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.lock");

        let lock = SweepLock::acquire(&path, DAY).unwrap();
        assert!(matches!(SweepLock::acquire(&path, DAY), Err(Error::Locked(_))));
        drop(lock);
        assert!(!path.exists());
        assert!(SweepLock::acquire(&path, DAY).is_ok());
    }

    #[test]
    fn old_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.lock");
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - DAY * 2)
            .unwrap();

        let lock = SweepLock::acquire(&path, DAY).unwrap();
        let owner = std::fs::read_to_string(&path).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
        drop(lock);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn lock_of_dead_process_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.lock");
        // Above the kernel's maximum PID, so no such process can exist.
        std::fs::write(&path, "4294967\n").unwrap();

        assert!(SweepLock::acquire(&path, DAY).is_ok());
    }

    #[test]
    fn fresh_lock_of_live_process_holds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.lock");
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        assert!(matches!(SweepLock::acquire(&path, DAY), Err(Error::Locked(_))));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn wayback_capture_uses_content_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/save/https:/+bot\.example\.org/file/a\.jpg$"))
            .respond_with(ResponseTemplate::new(200).insert_header(
                "content-location",
                "/web/20240101000000/https://bot.example.org/file/a.jpg",
            ))
            .mount(&server)
            .await;

        let client = WaybackClient::new("test", Duration::from_secs(5))
            .unwrap()
            .with_base_url(&server.uri());
        let archived = client
            .capture_or_cache("https://bot.example.org/file/a.jpg")
            .await
            .unwrap();

        assert!(archived.captured);
        assert_eq!(
            archived.archive_url,
            format!(
                "{}/web/20240101000000/https://bot.example.org/file/a.jpg",
                server.uri()
            )
        );
    }

    #[tokio::test]
    async fn wayback_rate_limit_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = WaybackClient::new("test", Duration::from_secs(5))
            .unwrap()
            .with_base_url(&server.uri());
        let err = client.capture_or_cache("https://x/y").await.unwrap_err();
        assert!(matches!(err, Error::Archive { status: 429, .. }));
    }
}
