pub mod oauth;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::credentials::Credential;
use crate::error::{Error, Result};
use oauth::OAuthSigner;

/// Authoritative quota fields parsed from the standardized rate-limit
/// response headers. Fields are optional because not every endpoint reports
/// them on every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateInfo {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<i64>,
}

/// Structured outcome of exactly one remote call. Anything that is neither a
/// success nor an explicit rate-limit rejection is surfaced as an error.
#[derive(Debug)]
pub enum CallOutcome<T> {
    Success { value: T, rate: Option<RateInfo> },
    RateLimited { reset_at: Option<i64> },
}

pub fn build_client(cfg: &Config) -> Result<Client> {
    let mut default_headers = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&cfg.user_agent) {
        default_headers.insert(USER_AGENT, ua);
    }
    // Authorization header is signed per request (nonce and timestamp vary).
    let client = Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .use_rustls_tls()
        .build()?;
    Ok(client)
}

pub fn extract_rate(headers: &HeaderMap) -> RateInfo {
    let parse_u32 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
    };
    let reset_at = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok());
    RateInfo {
        limit: parse_u32("x-rate-limit-limit"),
        remaining: parse_u32("x-rate-limit-remaining"),
        reset_at,
    }
}

/// Pull a human-readable message out of the v2 error body shapes.
fn api_error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = v
            .get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(detail) = v.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
        if let Some(title) = v.get("title").and_then(|t| t.as_str()) {
            return title.to_string();
        }
    }
    body.to_string()
}

/// Signed HTTP transport for the v2 API. Performs exactly one request per
/// `send`; all waiting and retry policy lives above it in the guard.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    api_url: String,
    signer: OAuthSigner,
}

impl Transport {
    pub fn new(cfg: &Config, credential: &Credential) -> Result<Self> {
        Ok(Self {
            client: build_client(cfg)?,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            signer: OAuthSigner::from_credential(credential),
        })
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<CallOutcome<Value>> {
        let url = format!("{}/{}", self.api_url, path.trim_start_matches('/'));
        // Query parameters participate in the OAuth signature; a JSON body
        // does not (RFC 5849 only signs form-encoded bodies).
        let auth = self
            .signer
            .authorization_header(method.as_str(), &url, query, &[]);

        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, auth);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await?;
        let status = res.status();
        let headers = res.headers().clone();
        let rate = extract_rate(&headers);
        debug!(
            "{} {} -> {} (remaining {:?})",
            method, url, status, rate.remaining
        );

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(CallOutcome::RateLimited {
                reset_at: rate.reset_at,
            });
        }

        let text = res.text().await?;
        if status.is_success() {
            let value = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).map_err(|e| Error::Api {
                    status: status.as_u16(),
                    message: format!("unparsable response body: {e}"),
                })?
            };
            return Ok(CallOutcome::Success {
                value,
                rate: Some(rate),
            });
        }

        Err(Error::Api {
            status: status.as_u16(),
            message: api_error_message(&text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_headers_parse_twitter_names() {
        let mut h = HeaderMap::new();
        h.insert("x-rate-limit-limit", "17".parse().unwrap());
        h.insert("x-rate-limit-remaining", "16".parse().unwrap());
        h.insert("x-rate-limit-reset", "1700000900".parse().unwrap());
        let rate = extract_rate(&h);
        assert_eq!(rate.limit, Some(17));
        assert_eq!(rate.remaining, Some(16));
        assert_eq!(rate.reset_at, Some(1_700_000_900));
    }

    #[test]
    fn rate_headers_absent_yield_none() {
        let rate = extract_rate(&HeaderMap::new());
        assert_eq!(
            rate,
            RateInfo {
                limit: None,
                remaining: None,
                reset_at: None,
            }
        );
    }

    #[test]
    fn error_message_extraction_covers_v2_shapes() {
        assert_eq!(
            api_error_message(r#"{"errors":[{"message":"nope"}]}"#),
            "nope"
        );
        assert_eq!(
            api_error_message(r#"{"title":"Forbidden","detail":"no access"}"#),
            "no access"
        );
        assert_eq!(api_error_message("plain text"), "plain text");
    }
}
