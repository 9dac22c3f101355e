use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::identity::{Identity, IdentityExpectations, verify_identity};
use crate::signing;

/// MediaWiki OAuth 1.0a consumer configuration.
///
/// Required fields are constructor parameters — no runtime "missing field" errors.
///
/// ```rust,ignore
/// use bot_portal::OAuthConfig;
///
/// let config = OAuthConfig::new("consumer-key", "consumer-secret")
///     .with_provider_url("https://test.wikipedia.org/w/index.php".parse()?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) consumer_key: String,
    pub(crate) consumer_secret: String,
    pub(crate) provider_url: Url,
    pub(crate) callback: String,
    pub(crate) user_agent: String,
    pub(crate) timeout: Duration,
}

impl OAuthConfig {
    /// Create a new consumer configuration.
    #[must_use]
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            provider_url: "https://meta.wikimedia.org/w/index.php"
                .parse()
                .expect("valid default URL"),
            callback: "oob".into(),
            user_agent: concat!("bot-portal/", env!("CARGO_PKG_VERSION")).into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the wiki's `index.php` URL.
    #[must_use]
    pub fn with_provider_url(mut self, url: Url) -> Self {
        self.provider_url = url;
        self
    }

    /// Override `oauth_callback` (default `oob`, i.e. the registered callback).
    #[must_use]
    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = callback.into();
        self
    }

    /// Override the `User-Agent` sent to the provider.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the per-request timeout (default 30s).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Consumer key.
    #[must_use]
    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// Wiki `index.php` URL.
    #[must_use]
    pub fn provider_url(&self) -> &Url {
        &self.provider_url
    }
}

/// Temporary credentials issued by `Special:OAuth/initiate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToken {
    pub key: String,
    pub secret: String,
}

/// Token credentials issued by `Special:OAuth/token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub key: String,
    pub secret: String,
}

/// Redirect target plus the request token to keep in the session.
#[non_exhaustive]
pub struct Initiation {
    pub authorize_url: String,
    pub request_token: RequestToken,
}

/// Client side of the three-legged MediaWiki OAuth 1.0a handshake.
pub struct Handshaker {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl Handshaker {
    /// Create a handshaker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: OAuthConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Leg one: obtain a request token and the authorize URL to send the user to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or
    /// [`Error::OAuth`] if the provider refuses or answers without credentials.
    pub async fn initiate(&self) -> Result<Initiation, Error> {
        let url = self.endpoint("Special:OAuth/initiate");
        let body = self
            .signed_post(
                &url,
                None,
                &[("oauth_callback", self.config.callback.as_str())],
                "initiate",
            )
            .await?;
        let (key, secret) = parse_credentials(&body, "initiate")?;

        let mut authorize = self.config.provider_url.clone();
        authorize
            .query_pairs_mut()
            .append_pair("title", "Special:OAuth/authorize")
            .append_pair("oauth_token", &key)
            .append_pair("oauth_consumer_key", &self.config.consumer_key);

        Ok(Initiation {
            authorize_url: authorize.into(),
            request_token: RequestToken { key, secret },
        })
    }

    /// Leg three: trade the verifier for an access token.
    ///
    /// `returned_token` is the `oauth_token` the provider appended to the
    /// callback; it must name the stored request token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OAuth`] if the returned token does not match or the
    /// provider refuses the exchange, [`Error::Http`] on network failure.
    pub async fn complete(
        &self,
        request_token: &RequestToken,
        verifier: &str,
        returned_token: &str,
    ) -> Result<AccessToken, Error> {
        if returned_token != request_token.key {
            return Err(Error::OAuth {
                operation: "token exchange",
                status: None,
                detail: format!(
                    "unexpected request token {returned_token:?}, expected {:?}",
                    request_token.key
                ),
            });
        }

        let url = self.endpoint("Special:OAuth/token");
        let body = self
            .signed_post(
                &url,
                Some((&request_token.key, &request_token.secret)),
                &[("oauth_verifier", verifier)],
                "token exchange",
            )
            .await?;
        let (key, secret) = parse_credentials(&body, "token exchange")?;
        Ok(AccessToken { key, secret })
    }

    /// Confirm who the access token belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OAuth`]/[`Error::Http`] if the request fails, or
    /// [`Error::Identity`] if the returned JWT does not verify.
    pub async fn identify(&self, access_token: &AccessToken) -> Result<Identity, Error> {
        let url = self.endpoint("Special:OAuth/identify");
        let nonce = signing::generate_nonce();
        let body = self
            .signed_post_with_nonce(
                &url,
                Some((&access_token.key, &access_token.secret)),
                &[],
                &nonce,
                "identify",
            )
            .await?;

        verify_identity(
            &body,
            &IdentityExpectations {
                provider: &self.config.provider_url,
                consumer_key: &self.config.consumer_key,
                consumer_secret: &self.config.consumer_secret,
                nonce: &nonce,
                now: time::OffsetDateTime::now_utc().unix_timestamp(),
            },
        )
    }

    fn endpoint(&self, title: &str) -> Url {
        let mut url = self.config.provider_url.clone();
        url.query_pairs_mut().append_pair("title", title);
        url
    }

    async fn signed_post(
        &self,
        url: &Url,
        token: Option<(&str, &str)>,
        extra: &[(&str, &str)],
        operation: &'static str,
    ) -> Result<String, Error> {
        let nonce = signing::generate_nonce();
        self.signed_post_with_nonce(url, token, extra, &nonce, operation)
            .await
    }

    async fn signed_post_with_nonce(
        &self,
        url: &Url,
        token: Option<(&str, &str)>,
        extra: &[(&str, &str)],
        nonce: &str,
        operation: &'static str,
    ) -> Result<String, Error> {
        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.config.consumer_key.clone()),
            ("oauth_nonce".into(), nonce.to_string()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), signing::timestamp()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some((key, _)) = token {
            params.push(("oauth_token".into(), key.to_string()));
        }
        params.extend(extra.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));

        let base = signing::signature_base_string("POST", url, &params);
        let token_secret = token.map(|(_, secret)| secret).unwrap_or_default();
        let signature = signing::sign_hmac_sha1(&base, &self.config.consumer_secret, token_secret);
        params.push(("oauth_signature".into(), signature));

        let response = self
            .http
            .post(url.clone())
            .header(
                reqwest::header::AUTHORIZATION,
                signing::authorization_header(&params),
            )
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        response.text().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::OAuth {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

/// Parses `oauth_token=..&oauth_token_secret=..` out of a provider response.
fn parse_credentials(body: &str, operation: &'static str) -> Result<(String, String), Error> {
    let mut key = None;
    let mut secret = None;
    for (k, v) in url::form_urlencoded::parse(body.trim().as_bytes()) {
        match k.as_ref() {
            "oauth_token" => key = Some(v.into_owned()),
            "oauth_token_secret" => secret = Some(v.into_owned()),
            _ => {}
        }
    }
    match (key, secret) {
        (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => Ok((key, secret)),
        _ => Err(Error::OAuth {
            operation,
            status: None,
            detail: body.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;

    pub(crate) fn test_config(server: &MockServer) -> OAuthConfig {
        OAuthConfig::new("ck", "cs")
            .with_provider_url(format!("{}/w/index.php", server.uri()).parse().unwrap())
    }

    /// Signs an identity for whatever nonce the request carried.
    pub(crate) struct EchoIdentity {
        pub(crate) issuer: String,
        pub(crate) username: &'static str,
    }

    impl Respond for EchoIdentity {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let header = request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let nonce = header
                .split(", ")
                .find_map(|field| field.strip_prefix("oauth_nonce=\""))
                .map(|v| v.trim_end_matches('"').to_string())
                .unwrap_or_default();
            let now = time::OffsetDateTime::now_utc().unix_timestamp();
            let jwt = jsonwebtoken::encode(
                &Header::new(Algorithm::HS256),
                &json!({
                    "iss": self.issuer,
                    "aud": "ck",
                    "iat": now,
                    "exp": now + 100,
                    "nonce": urlencoding::decode(&nonce).unwrap(),
                    "username": self.username,
                }),
                &EncodingKey::from_secret(b"cs"),
            )
            .unwrap();
            ResponseTemplate::new(200).set_body_string(jwt)
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = OAuthConfig::new("key", "secret");
        assert_eq!(config.consumer_key(), "key");
        assert_eq!(
            config.provider_url().as_str(),
            "https://meta.wikimedia.org/w/index.php"
        );
        assert_eq!(config.callback, "oob");
    }

    #[test]
    fn test_parse_credentials() {
        let (key, secret) =
            parse_credentials("oauth_token=abc&oauth_token_secret=def&oauth_callback_confirmed=true", "t")
                .unwrap();
        assert_eq!(key, "abc");
        assert_eq!(secret, "def");

        assert!(parse_credentials("Error: mwoauth-invalid-authorization", "t").is_err());
        assert!(parse_credentials("oauth_token=abc", "t").is_err());
    }

    #[tokio::test]
    async fn test_initiate_builds_authorize_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("title", "Special:OAuth/initiate"))
            .and(header_exists("authorization"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("oauth_token=rk&oauth_token_secret=rs&oauth_callback_confirmed=true"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let handshaker = Handshaker::new(test_config(&server)).unwrap();
        let initiation = handshaker.initiate().await.unwrap();

        assert_eq!(
            initiation.request_token,
            RequestToken {
                key: "rk".into(),
                secret: "rs".into()
            }
        );
        assert!(initiation.authorize_url.contains("title=Special%3AOAuth%2Fauthorize"));
        assert!(initiation.authorize_url.contains("oauth_token=rk"));
        assert!(initiation.authorize_url.contains("oauth_consumer_key=ck"));
    }

    #[tokio::test]
    async fn test_initiate_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("mwoauth-invalid-authorization"))
            .mount(&server)
            .await;

        let handshaker = Handshaker::new(test_config(&server)).unwrap();
        let err = handshaker.initiate().await.err().unwrap();
        assert!(matches!(
            err,
            Error::OAuth {
                status: Some(401),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_complete_rejects_mismatched_token_without_calling_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let handshaker = Handshaker::new(test_config(&server)).unwrap();
        let request_token = RequestToken {
            key: "rk".into(),
            secret: "rs".into(),
        };
        assert!(handshaker
            .complete(&request_token, "verifier", "other")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_complete_and_identify() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("title", "Special:OAuth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("oauth_token=ak&oauth_token_secret=as"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(query_param("title", "Special:OAuth/identify"))
            .respond_with(EchoIdentity {
                issuer: server.uri(),
                username: "Alice",
            })
            .expect(1)
            .mount(&server)
            .await;

        let handshaker = Handshaker::new(test_config(&server)).unwrap();
        let request_token = RequestToken {
            key: "rk".into(),
            secret: "rs".into(),
        };
        let access = handshaker
            .complete(&request_token, "verifier", "rk")
            .await
            .unwrap();
        assert_eq!(access.key, "ak");

        let identity = handshaker.identify(&access).await.unwrap();
        assert_eq!(identity.username, "Alice");
    }

    #[tokio::test]
    async fn test_identify_rejects_foreign_issuer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("title", "Special:OAuth/identify"))
            .respond_with(EchoIdentity {
                issuer: "https://elsewhere.example.org".into(),
                username: "Mallory",
            })
            .mount(&server)
            .await;

        let handshaker = Handshaker::new(test_config(&server)).unwrap();
        let access = AccessToken {
            key: "ak".into(),
            secret: "as".into(),
        };
        assert!(matches!(
            handshaker.identify(&access).await,
            Err(Error::Identity(_))
        ));
    }
}
