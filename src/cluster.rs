use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::pod::{PodDeletion, PodList, PodStatus};
use crate::types::PodName;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("valid ANSI escape pattern")
});

/// Removes ANSI escape sequences (colours, cursor moves) from log text.
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Connection settings for the pod-management API.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClusterConfig {
    pub(crate) api_url: String,
    pub(crate) namespace: String,
    pub(crate) bot_label: String,
    pub(crate) client_cert: Option<(PathBuf, PathBuf)>,
    pub(crate) verify_tls: bool,
    pub(crate) timeout: Duration,
}

impl ClusterConfig {
    /// Server certificate verification is off by default: the API is an
    /// internal endpoint with a self-signed certificate.
    #[must_use]
    pub fn new(
        api_url: impl Into<String>,
        namespace: impl Into<String>,
        bot_label: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            namespace: namespace.into(),
            bot_label: bot_label.into(),
            client_cert: None,
            verify_tls: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Authenticate with a PEM client certificate and key.
    #[must_use]
    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_cert = Some((cert.into(), key.into()));
        self
    }

    #[must_use]
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value of the `name` label that identifies the bot's pods.
    #[must_use]
    pub fn bot_label(&self) -> &str {
        &self.bot_label
    }
}

/// Thin client for the pods of one namespace.
pub struct ClusterClient {
    config: ClusterConfig,
    http: reqwest::Client,
}

impl ClusterClient {
    /// Build the client, loading the client certificate if configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the certificate files cannot be read, or
    /// [`Error::Http`] if they are not valid PEM.
    pub fn new(config: ClusterConfig) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls);

        if let Some((cert, key)) = &config.client_cert {
            let mut pem = std::fs::read(cert)?;
            pem.push(b'\n');
            pem.extend(std::fs::read(key)?);
            builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
        }

        Ok(Self {
            config,
            http: builder.build()?,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    fn pods_url(&self) -> String {
        format!(
            "{}/api/v1/namespaces/{}/pods",
            self.config.api_url, self.config.namespace
        )
    }

    fn pod_url(&self, pod: &PodName) -> String {
        format!("{}/{}", self.pods_url(), urlencoding::encode(&pod.0))
    }

    /// Names of the pods carrying the bot label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or [`Error::Cluster`] on a
    /// non-success status.
    pub async fn list_pod_names(&self) -> Result<Vec<PodName>, Error> {
        let response = self.http.get(self.pods_url()).send().await?;
        let response = Self::ensure_success(response, "list pods").await?;
        let list: PodList = response.json().await?;
        Ok(list.names_labelled(&self.config.bot_label))
    }

    async fn pod_detail(&self, pod: &PodName) -> Result<JsonValue, Error> {
        let response = self.http.get(self.pod_url(pod)).send().await?;
        let response = Self::ensure_success(response, "get pod").await?;
        response.json().await.map_err(Into::into)
    }

    /// Detail documents of the bot's pods, classified by cardinality.
    ///
    /// # Errors
    ///
    /// Returns an error if any API call fails.
    pub async fn pod_status(&self) -> Result<PodStatus, Error> {
        let names = self.list_pod_names().await?;
        match names.as_slice() {
            [] => Ok(PodStatus::NoPod),
            [single] => Ok(PodStatus::Running(self.pod_detail(single).await?)),
            several => {
                let mut details = Vec::with_capacity(several.len());
                for name in several {
                    details.push(self.pod_detail(name).await?);
                }
                Ok(PodStatus::Terminating(details))
            }
        }
    }

    /// Log of the single bot pod with ANSI escapes removed.
    ///
    /// `None` when not exactly one pod runs or the log is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if any API call fails.
    pub async fn pod_log(&self) -> Result<Option<String>, Error> {
        let names = self.list_pod_names().await?;
        let [single] = names.as_slice() else {
            return Ok(None);
        };

        let url = format!("{}/log", self.pod_url(single));
        let response = self.http.get(url).send().await?;
        let response = Self::ensure_success(response, "get pod log").await?;
        let log = strip_ansi(&response.text().await?);
        Ok((!log.is_empty()).then_some(log))
    }

    /// Delete the single bot pod so its controller starts a fresh one.
    ///
    /// Refuses, without issuing any DELETE, unless exactly one pod is
    /// observed: during a rolling restart the wrong pod could be hit.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or the DELETE call fails.
    pub async fn delete_pod(&self) -> Result<PodDeletion, Error> {
        let names = self.list_pod_names().await?;
        let [single] = names.as_slice() else {
            tracing::warn!(observed = names.len(), "Refusing to delete: pod set is not a singleton");
            return Ok(PodDeletion::Refused {
                observed: names.len(),
            });
        };

        let response = self.http.delete(self.pod_url(single)).send().await?;
        Self::ensure_success(response, "delete pod").await?;
        tracing::info!(pod = %single, "Bot pod deleted");
        Ok(PodDeletion::Deleted(single.clone()))
    }

    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        Err(Error::Cluster {
            operation,
            status,
            detail,
        })
    }
}
