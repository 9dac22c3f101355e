use std::future::Future;

use crate::cluster::ClusterClient;
use crate::control::{CommandOutput, ControlScript, ControlVerb};
use crate::error::Error;
use crate::pod::{PodDeletion, PodStatus};

pub const TERMINATING_NOTICE: &str = "Warning: A pod is being terminated now!";
pub const TRY_LATER: &str = "A pod is being terminated now, please try again later.";
pub const RESTART_REQUESTED: &str = "Request sent, please wait for at most one minute.";
pub const NO_POD: &str = "No bot pod is running.";

/// Text shown to the operator, with an optional advisory line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub body: String,
    pub notice: Option<String>,
}

impl Report {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            notice: None,
        }
    }

    #[must_use]
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    Accepted(Report),
    Refused(Report),
}

/// Whatever runs the bot: a cluster pod or a local control script.
///
/// The HTTP surface talks only to this trait.
pub trait BotBackend: Send + Sync + 'static {
    /// Name recorded in the audit log for restarts.
    fn service_name(&self) -> &str;

    fn status(&self) -> impl Future<Output = Result<Report, Error>> + Send;

    /// `None` when logs are unavailable right now (or from this backend).
    fn logs(&self) -> impl Future<Output = Result<Option<String>, Error>> + Send;

    fn restart(&self) -> impl Future<Output = Result<RestartOutcome, Error>> + Send;
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

impl BotBackend for ClusterClient {
    fn service_name(&self) -> &str {
        self.config().bot_label()
    }

    async fn status(&self) -> Result<Report, Error> {
        Ok(match self.pod_status().await? {
            PodStatus::NoPod => Report::new(NO_POD),
            PodStatus::Running(detail) => Report::new(pretty(&detail)),
            PodStatus::Terminating(details) => {
                Report::new(details.iter().map(pretty).collect::<Vec<_>>().join("\n"))
                    .with_notice(TERMINATING_NOTICE)
            }
        })
    }

    async fn logs(&self) -> Result<Option<String>, Error> {
        self.pod_log().await
    }

    async fn restart(&self) -> Result<RestartOutcome, Error> {
        Ok(match self.delete_pod().await? {
            PodDeletion::Deleted(_) => RestartOutcome::Accepted(Report::new(RESTART_REQUESTED)),
            PodDeletion::Refused { .. } => RestartOutcome::Refused(Report::new(TRY_LATER)),
        })
    }
}

impl From<CommandOutput> for Report {
    fn from(output: CommandOutput) -> Self {
        let report = Self::new(output.stdout);
        if output.stderr.is_empty() {
            report
        } else {
            report.with_notice(output.stderr)
        }
    }
}

impl BotBackend for ControlScript {
    fn service_name(&self) -> &str {
        ControlScript::service_name(self)
    }

    async fn status(&self) -> Result<Report, Error> {
        Ok(self.run(ControlVerb::Status).await?.into())
    }

    async fn logs(&self) -> Result<Option<String>, Error> {
        Ok(None)
    }

    async fn restart(&self) -> Result<RestartOutcome, Error> {
        let output = self.run(ControlVerb::Restart).await?;
        let accepted = output.status.success();
        let report = Report::from(output);
        Ok(if accepted {
            RestartOutcome::Accepted(report)
        } else {
            RestartOutcome::Refused(report)
        })
    }
}
