use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::error::Error;

/// Verb passed to the control script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVerb {
    Status,
    Restart,
}

impl ControlVerb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Restart => "restart",
        }
    }
}

/// Captured result of one script invocation, unmodified.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

/// Local script that starts, stops and reports on the bot.
#[derive(Debug, Clone)]
pub struct ControlScript {
    program: PathBuf,
    interpreter: Option<PathBuf>,
    service_name: String,
    timeout: Duration,
}

impl ControlScript {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let service_name = program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bot".into());
        Self {
            program,
            interpreter: None,
            service_name,
            timeout: Duration::from_secs(60),
        }
    }

    /// Bound on a single invocation (default 60s); the child is killed after it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the script through an interpreter (`bash script verb`) instead of
    /// executing it directly.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Run `<script> <verb>` and capture stdout and stderr separately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the script cannot be spawned and
    /// [`Error::ControlTimeout`] if it outlives the timeout.
    pub async fn run(&self, verb: ControlVerb) -> Result<CommandOutput, Error> {
        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.program);
                command
            }
            None => Command::new(&self.program),
        };
        let child = command
            .arg(verb.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::error!(
                    script = %self.program.display(),
                    verb = verb.as_str(),
                    "Control script timed out"
                );
                Error::ControlTimeout(self.timeout)
            })??;

        tracing::info!(
            script = %self.program.display(),
            verb = verb.as_str(),
            status = %output.status,
            "Control script finished"
        );

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status,
        })
    }
}
