//! Archive-then-delete sweep over the bot's published files.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use bot_portal::retention::{DAY, RetryPolicy};
use bot_portal::{RetentionPolicy, RetentionSweep, SweepLock, WaybackClient};

#[derive(Parser)]
#[command(name = "retention-sweep")]
#[command(about = "Archive old published files to the Wayback Machine, then delete them")]
#[command(version)]
struct Cli {
    /// Directory of published files
    #[arg(long, env = "SWEEP_DIR", default_value = "public_html/file")]
    dir: PathBuf,

    /// Public URL prefix the directory is served under
    #[arg(long, env = "SWEEP_PUBLIC_BASE")]
    public_base: String,

    /// Files older than this many days are swept
    #[arg(long, env = "SWEEP_RETENTION_DAYS", default_value_t = 179)]
    retention_days: u32,

    /// Extensions never archived nor deleted (repeatable)
    #[arg(long = "exclude", env = "SWEEP_EXCLUDE", value_delimiter = ',', default_value = "tgs")]
    excluded: Vec<String>,

    /// Archive attempts per file before giving up
    #[arg(long, env = "SWEEP_MAX_ATTEMPTS", default_value_t = 8)]
    max_attempts: u32,

    /// First retry delay in seconds; doubles on each failure
    #[arg(long, env = "SWEEP_BASE_DELAY_SECS", default_value_t = 30)]
    base_delay_secs: u64,

    /// Pause after each archival, in seconds
    #[arg(long, env = "SWEEP_COOLDOWN_SECS", default_value_t = 15)]
    cooldown_secs: u64,

    /// Lock file preventing concurrent sweeps
    #[arg(long, env = "SWEEP_LOCK_FILE", default_value = "retention-sweep.lock")]
    lock_file: PathBuf,

    /// Hours after which a lock left by a dead run is ignored
    #[arg(long, env = "SWEEP_LOCK_STALE_HOURS", default_value_t = 24)]
    lock_stale_hours: u64,

    /// User agent sent to the archive
    #[arg(long, env = "SWEEP_USER_AGENT", default_value = concat!("bot-portal-retention/", env!("CARGO_PKG_VERSION")))]
    user_agent: String,

    /// Archive request timeout in seconds
    #[arg(long, env = "SWEEP_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Archive base URL
    #[arg(long, env = "SWEEP_ARCHIVE_URL", default_value = "https://web.archive.org")]
    archive_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(cli.max_attempts > 0, "--max-attempts must be at least 1");

    let _lock = SweepLock::acquire(
        &cli.lock_file,
        Duration::from_secs(cli.lock_stale_hours * 60 * 60),
    )?;

    let mut policy = RetentionPolicy::new(cli.public_base);
    policy.max_age = DAY * cli.retention_days;
    policy.excluded_extensions = cli
        .excluded
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    policy.retry = RetryPolicy {
        base_delay: Duration::from_secs(cli.base_delay_secs),
        max_attempts: cli.max_attempts,
    };
    policy.cooldown = Duration::from_secs(cli.cooldown_secs);

    let archiver = WaybackClient::new(&cli.user_agent, Duration::from_secs(cli.timeout_secs))?
        .with_base_url(&cli.archive_url);

    info!(dir = %cli.dir.display(), days = cli.retention_days, "Starting retention sweep");
    let report = RetentionSweep::new(&cli.dir, policy, archiver).run().await?;

    info!(
        archived = report.archived.len(),
        failed = report.failed.len(),
        kept = report.kept,
        elapsed = ?report.elapsed,
        "Retention sweep finished"
    );
    for failure in &report.failed {
        tracing::warn!(file = %failure.name, error = %failure.error, "File kept after failure");
    }

    anyhow::ensure!(
        report.failed.is_empty(),
        "{} file(s) could not be archived or deleted",
        report.failed.len()
    );
    Ok(())
}
