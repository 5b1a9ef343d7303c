//! OAuth 1.0a request signing. Twitter requires HMAC-SHA1 signatures for
//! user-context requests; this module produces the Authorization header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;

use crate::credentials::Credential;

/// RFC 3986: everything except unreserved characters is percent-encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    token: Option<String>,
    token_secret: Option<String>,
}

impl OAuthSigner {
    /// Signer for the first leg of the PIN flow, before any token exists.
    pub fn for_request_token(consumer_key: &str, consumer_secret: &str) -> Self {
        Self {
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
            token: None,
            token_secret: None,
        }
    }

    pub fn with_token(
        consumer_key: &str,
        consumer_secret: &str,
        token: &str,
        token_secret: &str,
    ) -> Self {
        Self {
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
            token: Some(token.to_string()),
            token_secret: Some(token_secret.to_string()),
        }
    }

    pub fn from_credential(credential: &Credential) -> Self {
        Self::with_token(
            &credential.consumer_key,
            &credential.consumer_secret,
            &credential.access_token,
            &credential.access_token_secret,
        )
    }

    /// Build the `OAuth ...` Authorization header for one request.
    ///
    /// `params` are the request's query/form parameters (decoded values);
    /// `extra_oauth` carries flow-specific protocol parameters such as
    /// `oauth_callback` or `oauth_verifier`.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        extra_oauth: &[(String, String)],
    ) -> String {
        self.header_at(
            Utc::now().timestamp(),
            &generate_nonce(),
            method,
            url,
            params,
            extra_oauth,
        )
    }

    // Deterministic inner form: timestamp and nonce supplied by the caller.
    fn header_at(
        &self,
        timestamp: i64,
        nonce: &str,
        method: &str,
        url: &str,
        params: &[(String, String)],
        extra_oauth: &[(String, String)],
    ) -> String {
        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.clone()),
            ("oauth_nonce".into(), nonce.to_string()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), timestamp.to_string()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some(token) = &self.token {
            oauth_params.push(("oauth_token".into(), token.clone()));
        }
        oauth_params.extend(extra_oauth.iter().cloned());

        let mut all_params = oauth_params.clone();
        all_params.extend(params.iter().cloned());

        let base = signature_base(method, url, &all_params);
        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(self.token_secret.as_deref().unwrap_or(""))
        );
        oauth_params.push(("oauth_signature".into(), hmac_sha1(&signing_key, &base)));

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {header}")
    }
}

/// The RFC 5849 signature base string: method, URL and the sorted,
/// percent-encoded parameter string.
fn signature_base(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    sorted.sort();
    let param_string = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    )
}

fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

fn generate_nonce() -> String {
    let mut nonce = String::with_capacity(32);
    for _ in 0..16 {
        nonce.push_str(&format!("{:02x}", fastrand::u8(..)));
    }
    nonce
}

fn hmac_sha1(key: &str, data: &str) -> String {
    type HmacSha1 = Hmac<Sha1>;
    // HMAC accepts keys of any length.
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC key");
    mac.update(data.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_set_matches_rfc_3986() {
        assert_eq!(percent_encode("hello world"), "hello%20world");
        assert_eq!(percent_encode("foo=bar&baz"), "foo%3Dbar%26baz");
        assert_eq!(percent_encode("abc-._~123"), "abc-._~123");
        assert_eq!(percent_encode("100%"), "100%25");
    }

    #[test]
    fn base_string_sorts_encoded_parameters() {
        let params = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1 2".to_string()),
        ];
        let base = signature_base("get", "https://api.twitter.com/2/tweets", &params);
        assert_eq!(
            base,
            "GET&https%3A%2F%2Fapi.twitter.com%2F2%2Ftweets&a%3D1%25202%26b%3D2"
        );
    }

    #[test]
    fn nonce_is_32_hex_chars_and_unique() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn header_is_deterministic_given_timestamp_and_nonce() {
        let signer = OAuthSigner::with_token("ck", "cs", "at", "ats");
        let params = vec![("q".to_string(), "rust".to_string())];
        let h1 = signer.header_at(1_700_000_000, "abc123", "GET", "https://x/2/s", &params, &[]);
        let h2 = signer.header_at(1_700_000_000, "abc123", "GET", "https://x/2/s", &params, &[]);
        assert_eq!(h1, h2);
        assert!(h1.starts_with("OAuth "));
        assert!(h1.contains("oauth_consumer_key=\"ck\""));
        assert!(h1.contains("oauth_token=\"at\""));
        assert!(h1.contains("oauth_signature="));
    }

    #[test]
    fn request_token_header_carries_callback_and_no_token() {
        let signer = OAuthSigner::for_request_token("ck", "cs");
        let h = signer.header_at(
            1_700_000_000,
            "abc123",
            "POST",
            "https://x/oauth/request_token",
            &[],
            &[("oauth_callback".to_string(), "oob".to_string())],
        );
        assert!(h.contains("oauth_callback=\"oob\""));
        assert!(!h.contains("oauth_token=\""));
    }
}
