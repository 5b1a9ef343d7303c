//! Interactive PIN-based (out-of-band) OAuth 1.0a authorization. Runs only
//! when the credential store has nothing cached.

use std::io::{self, BufRead, Write};

use reqwest::header::AUTHORIZATION;
use reqwest::Client;

use crate::config::Config;
use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::http::{self, oauth::OAuthSigner};

/// Walk the user through the three-legged flow: fetch a request token,
/// point the user at the authorize URL, exchange the entered PIN for an
/// access token.
pub async fn pin_authorize(cfg: &Config) -> Result<Credential> {
    let client = http::build_client(cfg)?;
    let auth_base = cfg.auth_url.trim_end_matches('/');

    let request_token_url = format!("{auth_base}/oauth/request_token");
    let signer = OAuthSigner::for_request_token(&cfg.consumer_key, &cfg.consumer_secret);
    let header = signer.authorization_header(
        "POST",
        &request_token_url,
        &[],
        &[("oauth_callback".to_string(), "oob".to_string())],
    );
    let body = token_leg(&client, &request_token_url, header, "request token").await?;
    let (request_token, request_secret) = parse_token_response(&body)?;

    println!("\nAuthorize this application, then enter the PIN shown:");
    println!("\n  {auth_base}/oauth/authorize?oauth_token={request_token}\n");
    let pin = read_pin()?;

    let access_token_url = format!("{auth_base}/oauth/access_token");
    let signer = OAuthSigner::with_token(
        &cfg.consumer_key,
        &cfg.consumer_secret,
        &request_token,
        &request_secret,
    );
    let header = signer.authorization_header(
        "POST",
        &access_token_url,
        &[],
        &[("oauth_verifier".to_string(), pin)],
    );
    let body = token_leg(&client, &access_token_url, header, "access token").await?;
    let (access_token, access_token_secret) = parse_token_response(&body)?;

    Ok(Credential {
        consumer_key: cfg.consumer_key.clone(),
        consumer_secret: cfg.consumer_secret.clone(),
        access_token,
        access_token_secret,
    })
}

async fn token_leg(client: &Client, url: &str, header: String, leg: &str) -> Result<String> {
    let res = client
        .post(url)
        .header(AUTHORIZATION, header)
        .send()
        .await?;
    let status = res.status();
    if !status.is_success() {
        return Err(Error::AuthorizationDenied(format!(
            "{leg} request rejected ({status}); check your API key and secret"
        )));
    }
    Ok(res.text().await?)
}

/// Token legs answer with a form-encoded body:
/// `oauth_token=...&oauth_token_secret=...`.
fn parse_token_response(body: &str) -> Result<(String, String)> {
    let mut token = None;
    let mut secret = None;
    for (k, v) in url::form_urlencoded::parse(body.as_bytes()) {
        match k.as_ref() {
            "oauth_token" => token = Some(v.into_owned()),
            "oauth_token_secret" => secret = Some(v.into_owned()),
            _ => {}
        }
    }
    match (token, secret) {
        (Some(t), Some(s)) => Ok((t, s)),
        _ => Err(Error::AuthorizationDenied(
            "token response missing oauth_token/oauth_token_secret".to_string(),
        )),
    }
}

fn read_pin() -> Result<String> {
    print!("PIN: ");
    io::stdout()
        .flush()
        .map_err(|e| Error::AuthorizationDenied(format!("cannot prompt for PIN: {e}")))?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| Error::AuthorizationDenied(format!("cannot read PIN: {e}")))?;
    let pin = line.trim().to_string();
    if pin.is_empty() {
        return Err(Error::AuthorizationDenied("no PIN entered".to_string()));
    }
    Ok(pin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_parses_form_encoding() {
        let (t, s) = parse_token_response(
            "oauth_token=abc%2Fdef&oauth_token_secret=xyz&oauth_callback_confirmed=true",
        )
        .unwrap();
        assert_eq!(t, "abc/def");
        assert_eq!(s, "xyz");
    }

    #[test]
    fn missing_fields_are_denial() {
        let err = parse_token_response("oauth_token=only").unwrap_err();
        assert!(matches!(err, Error::AuthorizationDenied(_)));
    }
}
