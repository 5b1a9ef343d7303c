use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Runtime configuration for the Twitter API client.
/// Values are sourced from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub api_url: String,
    pub auth_url: String,
    pub state_dir: PathBuf,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment.
    ///
    /// Env vars:
    /// - TWITTER_API_KEY [required]
    /// - TWITTER_API_SECRET [required]
    /// - TWITTER_API_URL (default: https://api.twitter.com/2)
    /// - TWITTER_AUTH_URL (default: https://api.twitter.com)
    /// - TWITTER_STATE_DIR (default: <config_dir>/twitter-cli)
    /// - TWITTER_HTTP_TIMEOUT_SECS (default: 30)
    /// - TWITTER_USER_AGENT (default: twitter-cli/<version>)
    pub fn from_env() -> Result<Self> {
        let consumer_key = env::var("TWITTER_API_KEY")
            .map_err(|_| Error::Config("Missing TWITTER_API_KEY".to_string()))?;
        let consumer_secret = env::var("TWITTER_API_SECRET")
            .map_err(|_| Error::Config("Missing TWITTER_API_SECRET".to_string()))?;

        let api_url = env::var("TWITTER_API_URL")
            .unwrap_or_else(|_| "https://api.twitter.com/2".to_string());
        let auth_url =
            env::var("TWITTER_AUTH_URL").unwrap_or_else(|_| "https://api.twitter.com".to_string());

        let state_dir = match env::var("TWITTER_STATE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::config_dir()
                .map(|d| d.join("twitter-cli"))
                .ok_or_else(|| {
                    Error::Config(
                        "No user config directory; set TWITTER_STATE_DIR explicitly".to_string(),
                    )
                })?,
        };

        let timeout_secs = env::var("TWITTER_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        let default_ua = format!("twitter-cli/{}", env!("CARGO_PKG_VERSION"));
        let user_agent = env::var("TWITTER_USER_AGENT").unwrap_or(default_ua);

        Ok(Self {
            consumer_key,
            consumer_secret,
            api_url,
            auth_url,
            state_dir,
            user_agent,
            timeout_secs,
        })
    }
}
