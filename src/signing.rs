//! OAuth 1.0a request signing (RFC 5849, `HMAC-SHA1`).

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use url::Url;

/// Generates a random `oauth_nonce`.
///
/// Returns a 22-character URL-safe string (16 random bytes → base64url).
#[must_use]
pub fn generate_nonce() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Current Unix time in seconds, as sent in `oauth_timestamp`.
#[must_use]
pub fn timestamp() -> String {
    time::OffsetDateTime::now_utc().unix_timestamp().to_string()
}

/// RFC 3986 percent-encoding: everything but `A-Za-z0-9-._~`.
#[must_use]
pub fn percent_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Builds the signature base string for a request.
///
/// `params` are the `oauth_*` protocol parameters plus any form-encoded body
/// parameters; query parameters are taken from `url` itself.
#[must_use]
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .chain(params.iter().map(|(k, v)| (percent_encode(k), percent_encode(v))))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let base_uri = match url.port() {
        Some(port) => format!("{}://{host}:{port}{}", url.scheme(), url.path()),
        None => format!("{}://{host}{}", url.scheme(), url.path()),
    };

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_uri),
        percent_encode(&normalized)
    )
}

/// Computes `oauth_signature` over a base string.
#[must_use]
pub fn sign_hmac_sha1(base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac =
        Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Renders protocol parameters (signature included) as an `Authorization` header value.
#[must_use]
pub fn authorization_header(oauth_params: &[(String, String)]) -> String {
    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {fields}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    // Widely published worked example (status update request).
    fn example_params() -> Vec<(String, String)> {
        pairs(&[
            ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
            ("oauth_consumer_key", "xvz1evFS4wEEPTGEFPHBog"),
            ("oauth_nonce", "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1318622958"),
            ("oauth_token", "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb"),
            ("oauth_version", "1.0"),
        ])
    }

    #[test]
    fn test_base_string_sorted_and_encoded() {
        let url: Url = "https://api.twitter.com/1.1/statuses/update.json?include_entities=true"
            .parse()
            .unwrap();
        let base = signature_base_string("post", &url, &example_params());

        assert!(base.starts_with(
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&\
             include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog"
        ));
        assert!(base.ends_with(
            "status%3DHello%2520Ladies%2520%252B%2520Gentlemen%252C%2520a%2520signed%2520OAuth%2520request%2521"
        ));
    }

    #[test]
    fn test_known_signature() {
        let url: Url = "https://api.twitter.com/1.1/statuses/update.json?include_entities=true"
            .parse()
            .unwrap();
        let base = signature_base_string("POST", &url, &example_params());
        let signature = sign_hmac_sha1(
            &base,
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        );
        assert_eq!(signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn test_base_uri_keeps_explicit_port() {
        let url: Url = "http://127.0.0.1:8080/w/index.php?title=Special%3AOAuth%2Finitiate"
            .parse()
            .unwrap();
        let base = signature_base_string("POST", &url, &[]);
        assert_eq!(
            base,
            "POST&http%3A%2F%2F127.0.0.1%3A8080%2Fw%2Findex.php&title%3DSpecial%253AOAuth%252Finitiate"
        );
    }

    #[test]
    fn test_empty_token_secret_keeps_separator() {
        let a = sign_hmac_sha1("base", "secret", "");
        let b = sign_hmac_sha1("base", "secret", "other");
        assert_ne!(a, b);
    }

    #[test]
    fn test_authorization_header_format() {
        let header = authorization_header(&pairs(&[
            ("oauth_consumer_key", "key"),
            ("oauth_signature", "a+b="),
        ]));
        assert_eq!(
            header,
            "OAuth oauth_consumer_key=\"key\", oauth_signature=\"a%2Bb%3D\""
        );
    }

    #[test]
    fn test_nonce_uniqueness() {
        let n1 = generate_nonce();
        let n2 = generate_nonce();
        assert_eq!(n1.len(), 22);
        assert_ne!(n1, n2, "nonces should be unique");
    }
}
