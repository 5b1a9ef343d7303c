//! Twitter v2 API operations. Every remote call goes through the guarded
//! invocation path with a stable endpoint key, so quota accounting is the
//! same no matter which command triggered the call.

use std::fs;
use std::path::PathBuf;

use log::warn;
use reqwest::Method;
use serde_json::{json, Value};

use crate::config::Config;
use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::guard;
use crate::http::Transport;
use crate::quota::{keys, QuotaLedger, QuotaTracker};

pub struct TwitterApi {
    transport: Transport,
    tracker: QuotaTracker,
    user_id_path: PathBuf,
}

impl TwitterApi {
    pub fn new(cfg: &Config, credential: &Credential) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(cfg, credential)?,
            tracker: QuotaTracker::new(&cfg.state_dir),
            user_id_path: cfg.state_dir.join("user_id.json"),
        })
    }

    pub fn quota_snapshot(&self) -> Result<QuotaLedger> {
        self.tracker.snapshot()
    }

    async fn call(
        &self,
        key: &str,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        guard::invoke(&self.tracker, key, || {
            self.transport.send(method.clone(), path, query, body)
        })
        .await
    }

    /// The authenticated user's id, resolved once and cached on disk so the
    /// lookup quota (25/24h) is not spent on every like or timeline call.
    pub async fn user_id(&self) -> Result<String> {
        if let Some(id) = self.load_cached_user_id() {
            return Ok(id);
        }
        let me = self
            .call(keys::ME, Method::GET, "users/me", &[], None)
            .await?;
        let id = me["data"]["id"]
            .as_str()
            .ok_or_else(|| Error::Api {
                status: 200,
                message: "users/me response missing data.id".to_string(),
            })?
            .to_string();
        self.save_user_id(&id);
        Ok(id)
    }

    fn load_cached_user_id(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.user_id_path).ok()?;
        let v: Value = serde_json::from_str(&contents).ok()?;
        v["user_id"].as_str().map(str::to_string)
    }

    fn save_user_id(&self, id: &str) {
        // Best effort: losing this cache only costs one users/me lookup.
        let payload = json!({ "user_id": id }).to_string();
        if let Err(e) = fs::write(&self.user_id_path, payload) {
            warn!("Failed to cache user id: {e}");
        }
    }

    pub async fn create_tweet(&self, text: &str, reply_to: Option<&str>) -> Result<Value> {
        let mut payload = json!({ "text": text });
        if let Some(reply_to) = reply_to {
            payload["reply"] = json!({ "in_reply_to_tweet_id": reply_to });
        }
        self.call(
            keys::CREATE_TWEET,
            Method::POST,
            "tweets",
            &[],
            Some(&payload),
        )
        .await
    }

    pub async fn delete_tweet(&self, tweet_id: &str) -> Result<Value> {
        let path = format!("tweets/{}", urlencoding::encode(tweet_id));
        self.call(keys::DELETE_TWEET, Method::DELETE, &path, &[], None)
            .await
    }

    pub async fn like(&self, tweet_id: &str) -> Result<Value> {
        let user_id = self.user_id().await?;
        let path = format!("users/{}/likes", urlencoding::encode(&user_id));
        let payload = json!({ "tweet_id": tweet_id });
        self.call(keys::LIKE, Method::POST, &path, &[], Some(&payload))
            .await
    }

    pub async fn unlike(&self, tweet_id: &str) -> Result<Value> {
        let user_id = self.user_id().await?;
        let path = format!(
            "users/{}/likes/{}",
            urlencoding::encode(&user_id),
            urlencoding::encode(tweet_id)
        );
        self.call(keys::UNLIKE, Method::DELETE, &path, &[], None)
            .await
    }

    pub async fn search(&self, query: &str, limit: u32) -> Result<Value> {
        // Raw queries are wrapped to drop retweets and non-English results.
        let formatted = format!("({query}) -is:retweet lang:en");
        let params = vec![
            ("query".to_string(), formatted),
            ("max_results".to_string(), limit.min(100).to_string()),
            (
                "tweet.fields".to_string(),
                "created_at,public_metrics,author_id,text,lang,referenced_tweets".to_string(),
            ),
            (
                "expansions".to_string(),
                "author_id,referenced_tweets.id".to_string(),
            ),
            (
                "user.fields".to_string(),
                "username,name,verified,profile_image_url".to_string(),
            ),
        ];
        self.call(
            keys::SEARCH,
            Method::GET,
            "tweets/search/recent",
            &params,
            None,
        )
        .await
    }

    pub async fn get_tweet(&self, tweet_id: &str) -> Result<Value> {
        let path = format!("tweets/{}", urlencoding::encode(tweet_id));
        let params = vec![(
            "tweet.fields".to_string(),
            "created_at,public_metrics,author_id,text".to_string(),
        )];
        self.call(keys::GET_TWEET, Method::GET, &path, &params, None)
            .await
    }

    pub async fn user_info(&self, username: &str) -> Result<Value> {
        let path = format!("users/by/username/{}", urlencoding::encode(username));
        let params = vec![(
            "user.fields".to_string(),
            "created_at,description,public_metrics,verified,location,url,profile_image_url"
                .to_string(),
        )];
        self.call(keys::USER_BY_USERNAME, Method::GET, &path, &params, None)
            .await
    }

    pub async fn user_tweets(&self, user_id: &str, limit: u32) -> Result<Value> {
        let path = format!("users/{}/tweets", urlencoding::encode(user_id));
        let params = vec![
            ("max_results".to_string(), limit.min(100).to_string()),
            (
                "tweet.fields".to_string(),
                "created_at,public_metrics,author_id,text".to_string(),
            ),
            (
                "expansions".to_string(),
                "author_id,referenced_tweets.id".to_string(),
            ),
            (
                "user.fields".to_string(),
                "username,name,verified".to_string(),
            ),
        ];
        self.call(keys::USER_TWEETS, Method::GET, &path, &params, None)
            .await
    }

    pub async fn home_timeline(&self, limit: u32) -> Result<Value> {
        let user_id = self.user_id().await?;
        let path = format!(
            "users/{}/timelines/reverse_chronological",
            urlencoding::encode(&user_id)
        );
        let params = vec![
            ("max_results".to_string(), limit.min(100).to_string()),
            (
                "tweet.fields".to_string(),
                "created_at,public_metrics,author_id,text".to_string(),
            ),
            ("expansions".to_string(), "author_id".to_string()),
            (
                "user.fields".to_string(),
                "username,name,verified".to_string(),
            ),
        ];
        self.call(keys::HOME_TIMELINE, Method::GET, &path, &params, None)
            .await
    }
}
