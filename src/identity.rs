use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::Error;

/// Seconds of clock skew tolerated on the `iat` claim.
pub const IAT_LEEWAY_SECS: i64 = 10;

/// Identity claims returned by the provider's identify endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct Identity {
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub nonce: String,
    pub username: String,
    /// Provider-wide user id; numeric on MediaWiki, kept opaque.
    #[serde(default)]
    pub sub: Option<JsonValue>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub blocked: bool,
}

/// What a verified identity must match.
pub struct IdentityExpectations<'a> {
    /// Provider URL; the token's `iss` must name the same host and port.
    pub provider: &'a Url,
    /// Consumer key, expected as `aud`.
    pub consumer_key: &'a str,
    /// Consumer secret, the HS256 signing key.
    pub consumer_secret: &'a str,
    /// The `oauth_nonce` sent with the identify request.
    pub nonce: &'a str,
    /// Current Unix time.
    pub now: i64,
}

/// Verifies the identify JWT and returns its claims.
///
/// Checks the HS256 signature, `exp`, `aud`, the issuer host, the nonce and
/// that `iat` is not in the future beyond [`IAT_LEEWAY_SECS`].
///
/// # Errors
///
/// Returns `Error::Identity` describing the first check that failed.
pub fn verify_identity(token: &str, expected: &IdentityExpectations<'_>) -> Result<Identity, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[expected.consumer_key]);
    validation.leeway = IAT_LEEWAY_SECS as u64;

    let data = jsonwebtoken::decode::<Identity>(
        token.trim(),
        &DecodingKey::from_secret(expected.consumer_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| Error::Identity(e.to_string()))?;
    let identity = data.claims;

    let issuer: Url = identity
        .iss
        .parse()
        .map_err(|e| Error::Identity(format!("iss: {e}")))?;
    if issuer.host_str() != expected.provider.host_str()
        || issuer.port_or_known_default() != expected.provider.port_or_known_default()
    {
        return Err(Error::Identity(format!(
            "iss: expected host of '{}', got '{}'",
            expected.provider, identity.iss
        )));
    }

    if identity.nonce != expected.nonce {
        return Err(Error::Identity("nonce mismatch".into()));
    }

    if identity.iat > expected.now + IAT_LEEWAY_SECS {
        return Err(Error::Identity("identity issued in the future".into()));
    }

    Ok(identity)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const KEY: &str = "consumer-key";
    const SECRET: &str = "consumer-secret";

    fn now() -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }

    fn token(claims: &JsonValue, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(nonce: &str) -> JsonValue {
        let now = now();
        json!({
            "iss": "https://meta.wikimedia.org",
            "aud": KEY,
            "iat": now,
            "exp": now + 100,
            "nonce": nonce,
            "username": "Alice",
            "sub": 12345,
            "groups": ["*", "user"],
            "blocked": false,
        })
    }

    fn verify(token: &str, nonce: &str) -> Result<Identity, Error> {
        let provider: Url = "https://meta.wikimedia.org/w/index.php".parse().unwrap();
        verify_identity(
            token,
            &IdentityExpectations {
                provider: &provider,
                consumer_key: KEY,
                consumer_secret: SECRET,
                nonce,
                now: now(),
            },
        )
    }

    #[test]
    fn accepts_valid_identity() {
        let identity = verify(&token(&claims("n1"), SECRET), "n1").unwrap();
        assert_eq!(identity.username, "Alice");
        assert_eq!(identity.groups, vec!["*", "user"]);
        assert_eq!(identity.sub, Some(json!(12345)));
    }

    #[test]
    fn rejects_wrong_secret() {
        assert!(verify(&token(&claims("n1"), "other"), "n1").is_err());
    }

    #[test]
    fn rejects_nonce_mismatch() {
        let err = verify(&token(&claims("n1"), SECRET), "n2").unwrap_err();
        assert!(err.to_string().contains("nonce"));
    }

    #[test]
    fn rejects_wrong_audience() {
        let mut c = claims("n1");
        c["aud"] = json!("someone-else");
        assert!(verify(&token(&c, SECRET), "n1").is_err());
    }

    #[test]
    fn rejects_foreign_issuer() {
        let mut c = claims("n1");
        c["iss"] = json!("https://evil.example.org");
        let err = verify(&token(&c, SECRET), "n1").unwrap_err();
        assert!(err.to_string().contains("iss"));
    }

    #[test]
    fn rejects_future_iat() {
        let mut c = claims("n1");
        c["iat"] = json!(now() + 3600);
        c["exp"] = json!(now() + 7200);
        let err = verify(&token(&c, SECRET), "n1").unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn rejects_expired() {
        let mut c = claims("n1");
        c["iat"] = json!(now() - 7200);
        c["exp"] = json!(now() - 3600);
        assert!(verify(&token(&c, SECRET), "n1").is_err());
    }
}
