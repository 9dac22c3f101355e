use std::str::FromStr;
use std::time::Duration;

use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::WebError;
use crate::allow_list::AllowList;
use crate::audit::AuditLog;
use crate::cluster::ClusterConfig;
use crate::control::ControlScript;
use crate::files::FileStore;
use crate::oauth::{Handshaker, OAuthConfig};

/// Portal settings shared by config and runtime state.
#[derive(Clone)]
pub(crate) struct PortalSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) audit_recent: usize,
}

impl PortalSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__bot_portal_session".into(),
            session_ttl_days: 7,
            secure_cookies: true,
            audit_recent: 50,
        }
    }
}

/// Everything the portal routes need except the bot backend and session store.
///
/// Use [`from_env()`](PortalConfig::from_env) for convention-based setup,
/// or [`new()`](PortalConfig::new) with `with_*` methods for full control.
pub struct PortalConfig {
    pub(super) handshaker: Handshaker,
    pub(super) allow_list: AllowList,
    pub(super) audit: AuditLog,
    pub(super) files: FileStore,
    pub(super) settings: PortalSettings,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required_var(name: &str) -> Result<String, WebError> {
    env_var(name).ok_or_else(|| WebError::Config(format!("{name} is required")))
}

fn parsed_var<T>(name: &str) -> Result<Option<T>, WebError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| WebError::Config(format!("{name}: {e}")))
        })
        .transpose()
}

fn flag_var(name: &str) -> bool {
    matches!(env_var(name).as_deref(), Some("1" | "true" | "yes"))
}

impl PortalConfig {
    /// Create config from the required collaborators.
    ///
    /// Cookie and display settings use defaults; override with `with_*`.
    #[must_use]
    pub fn new(handshaker: Handshaker, allow_list: AllowList, audit: AuditLog, files: FileStore) -> Self {
        Self {
            handshaker,
            allow_list,
            audit,
            files,
            settings: PortalSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `PORTAL_CONSUMER_KEY`: OAuth consumer key registered on the wiki
    /// - `PORTAL_CONSUMER_SECRET`: OAuth consumer secret
    ///
    /// # Optional env vars
    /// - `PORTAL_OAUTH_URL`: wiki `index.php` URL
    /// - `PORTAL_USER_AGENT`: user agent for provider requests
    /// - `PORTAL_HTTP_TIMEOUT_SECS`: provider request timeout
    /// - `PORTAL_COOKIE_KEY`: cookie encryption key bytes (at least 64)
    /// - `PORTAL_INSECURE_COOKIES`: `1`/`true` to drop the `Secure` cookie flag
    /// - `PORTAL_ALLOW_LIST`, `PORTAL_AUDIT_LOG`, `PORTAL_FILE_DIR`: paths
    /// - `PORTAL_FILE_CONTENT_TYPE`: content type of served files
    /// - `PORTAL_AUDIT_RECENT`: entries shown on the audit page
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Config`] if required env vars are missing or
    /// values do not parse.
    pub fn from_env() -> Result<Self, WebError> {
        let mut oauth = OAuthConfig::new(
            required_var("PORTAL_CONSUMER_KEY")?,
            required_var("PORTAL_CONSUMER_SECRET")?,
        );
        if let Some(url) = parsed_var::<Url>("PORTAL_OAUTH_URL")? {
            oauth = oauth.with_provider_url(url);
        }
        if let Some(agent) = env_var("PORTAL_USER_AGENT") {
            oauth = oauth.with_user_agent(agent);
        }
        if let Some(secs) = parsed_var::<u64>("PORTAL_HTTP_TIMEOUT_SECS")? {
            oauth = oauth.with_timeout(Duration::from_secs(secs));
        }
        let handshaker = Handshaker::new(oauth).map_err(|e| WebError::Config(e.to_string()))?;

        let cookie_key = match env_var("PORTAL_COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                WebError::Config(
                    "PORTAL_COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => {
                tracing::warn!("PORTAL_COOKIE_KEY not set; sessions will not survive a restart");
                Key::generate()
            }
        };

        let mut files =
            FileStore::new(env_var("PORTAL_FILE_DIR").unwrap_or_else(|| "public_html/file".into()));
        if let Some(content_type) = env_var("PORTAL_FILE_CONTENT_TYPE") {
            files = files.with_content_type(content_type);
        }

        let mut config = Self::new(
            handshaker,
            AllowList::new(env_var("PORTAL_ALLOW_LIST").unwrap_or_else(|| "user.json".into())),
            AuditLog::new(env_var("PORTAL_AUDIT_LOG").unwrap_or_else(|| "audit.log".into())),
            files,
        )
        .with_cookie_key(cookie_key)
        .with_secure_cookies(!flag_var("PORTAL_INSECURE_COOKIES"));

        if let Some(n) = parsed_var::<usize>("PORTAL_AUDIT_RECENT")? {
            config = config.with_audit_recent(n);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Number of entries shown on `/audit` (default 50).
    #[must_use]
    pub fn with_audit_recent(mut self, n: usize) -> Self {
        self.settings.audit_recent = n;
        self
    }
}

/// How the bot is run: as a cluster pod or through a local control script.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Cluster(ClusterConfig),
    Script(ControlScript),
}

impl BackendConfig {
    /// Select and configure the backend from `PORTAL_BACKEND` (`cluster`
    /// by default, or `script`).
    ///
    /// # Cluster env vars
    /// - `PORTAL_CLUSTER_API` (required), `PORTAL_CLUSTER_NAMESPACE` (required),
    ///   `PORTAL_CLUSTER_BOT_LABEL` (required)
    /// - `PORTAL_CLUSTER_CERT` + `PORTAL_CLUSTER_KEY`: PEM client certificate
    /// - `PORTAL_CLUSTER_VERIFY_TLS`: `1`/`true` to verify the server certificate
    /// - `PORTAL_HTTP_TIMEOUT_SECS`
    ///
    /// # Script env vars
    /// - `PORTAL_CONTROL_SCRIPT` (required), `PORTAL_CONTROL_TIMEOUT_SECS`
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Config`] for an unknown backend, a missing
    /// required variable, or an unparsable value.
    pub fn from_env() -> Result<Self, WebError> {
        match env_var("PORTAL_BACKEND").as_deref().unwrap_or("cluster") {
            "cluster" => {
                let mut config = ClusterConfig::new(
                    required_var("PORTAL_CLUSTER_API")?,
                    required_var("PORTAL_CLUSTER_NAMESPACE")?,
                    required_var("PORTAL_CLUSTER_BOT_LABEL")?,
                )
                .with_verify_tls(flag_var("PORTAL_CLUSTER_VERIFY_TLS"));
                match (env_var("PORTAL_CLUSTER_CERT"), env_var("PORTAL_CLUSTER_KEY")) {
                    (Some(cert), Some(key)) => config = config.with_client_cert(cert, key),
                    (None, None) => {}
                    _ => {
                        return Err(WebError::Config(
                            "PORTAL_CLUSTER_CERT and PORTAL_CLUSTER_KEY must be set together".into(),
                        ));
                    }
                }
                if let Some(secs) = parsed_var::<u64>("PORTAL_HTTP_TIMEOUT_SECS")? {
                    config = config.with_timeout(Duration::from_secs(secs));
                }
                Ok(Self::Cluster(config))
            }
            "script" => {
                let mut script = ControlScript::new(required_var("PORTAL_CONTROL_SCRIPT")?);
                if let Some(secs) = parsed_var::<u64>("PORTAL_CONTROL_TIMEOUT_SECS")? {
                    script = script.with_timeout(Duration::from_secs(secs));
                }
                Ok(Self::Script(script))
            }
            other => Err(WebError::Config(format!(
                "PORTAL_BACKEND must be `cluster` or `script`, got `{other}`"
            ))),
        }
    }
}
